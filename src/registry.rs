//! The published host-class → [`Representation`] cache.
//!
//! Grounded in `vm::context::Context` (which holds the published builtin
//! types) and the factory/registry lock-ordering described in `types::zoo`'s
//! bootstrap comments: factory lock, then registry lock, never reversed.

use ahash::RandomState;
use indexmap::IndexMap;
use log::trace;
use parking_lot::RwLock;

use crate::error::{CoreError, PyErr};
use crate::factory::TypeFactory;
use crate::object::HostClass;
use crate::representation::Representation;

/// A two-tier cache: callers that only need a synchronous check use
/// [`TypeRegistry::lookup`]; callers that need a guaranteed answer use
/// [`TypeRegistry::get`], which creates on demand.
pub struct TypeRegistry {
    published: RwLock<IndexMap<HostClass, Representation, RandomState>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(IndexMap::default()),
        }
    }

    /// Synchronous map read only, no creation.
    pub fn lookup(&self, host_class: HostClass) -> Option<Representation> {
        self.published.read().get(&host_class).cloned()
    }

    /// Never fails for a class that is legally the instance class of any
    /// object in the runtime (§4.3). Resolution order: published map, then
    /// the factory's find-or-create.
    pub fn get(&self, host_class: HostClass, factory: &TypeFactory) -> Result<Representation, PyErr> {
        if let Some(repr) = self.lookup(host_class) {
            return Ok(repr);
        }
        factory
            .find_or_create(host_class, self)
            .map_err(CoreError::into_py_err)
    }

    /// Publish a representation. Lookups are monotonic: a class, once
    /// published, is never unpublished or replaced.
    pub(crate) fn publish(&self, host_class: HostClass, repr: Representation) -> Result<(), CoreError> {
        let mut map = self.published.write();
        if map.contains_key(&host_class) {
            return Err(CoreError::DoublePublication(format!("{:?}", host_class)));
        }
        trace!(target: "pytype_core::registry", "publishing host class {:?}", host_class);
        map.insert(host_class, repr);
        Ok(())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Runtime;

    #[test]
    fn lookup_before_publish_is_absent() {
        let rt = Runtime::new();
        assert!(rt.registry().lookup(std::any::TypeId::of::<Vec<u8>>()).is_none());
    }

    #[test]
    fn get_is_stable_across_calls() {
        let rt = Runtime::new();
        let host_class = std::any::TypeId::of::<Vec<u8>>();
        let first = rt.registry().get(host_class, rt.factory()).unwrap();
        let second = rt.registry().get(host_class, rt.factory()).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first.python_type(&crate::object::PyObjectRef::new(1u8, rt.types().object.clone())), &second.python_type(&crate::object::PyObjectRef::new(1u8, rt.types().object.clone()))));
    }
}
