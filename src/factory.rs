//! The engine that builds `PyType`s and `Representation`s from a
//! [`TypeSpec`] (§4.5).
//!
//! Grounded in `types::zoo::TypeZoo::init`/`extend` (construction order,
//! work-table-then-publish shape) and `vm::context::Context` (publication).
//! Lock order is always factory, then registry -- never the reverse --
//! matching §5's ordering guarantee.

use ahash::RandomState;
use indexmap::IndexMap;
use log::{debug, trace};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::CoreError;
use crate::object::HostClass;
use crate::pytype::{self, PyType, PyTypeRef, Variant};
use crate::registry::TypeRegistry;
use crate::representation::{Representation, TypeSource};
use crate::slots::DispatchVector;
use crate::special_method::SpecialMethod;
use crate::spec::TypeSpec;

/// The only agent that creates `PyType`s and `Representation`s. Serialises
/// construction with a single coarse lock, held only during construction
/// (never across user/dispatch code).
pub struct TypeFactory {
    lock: Mutex<()>,
    work_table: Mutex<IndexMap<HostClass, PyTypeRef, RandomState>>,
    /// The fallback target for the registry's synthetic-representation
    /// discovery policy (§4.3); set once by bootstrap once `object` exists.
    root_object: OnceCell<PyTypeRef>,
}

impl TypeFactory {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            work_table: Mutex::new(IndexMap::default()),
            root_object: OnceCell::new(),
        }
    }

    pub(crate) fn set_root_object(&self, object_type: PyTypeRef) {
        let _ = self.root_object.set(object_type);
    }

    /// A partial type under construction, if any thread has one in flight
    /// for `host_class`. Lets recursive `from_spec` calls (triggered while
    /// scanning the primary class, per §4.5 step 3) observe an identity
    /// before it is published.
    pub fn in_progress(&self, host_class: HostClass) -> Option<PyTypeRef> {
        self.work_table.lock().get(&host_class).cloned()
    }

    /// Construction protocol for `fromSpec(spec)` (§4.5).
    pub fn from_spec(&self, spec: TypeSpec, registry: &TypeRegistry) -> Result<PyTypeRef, CoreError> {
        let _guard = self.lock.lock();

        // Step 1: an existing publication short-circuits construction.
        if let Some(existing) = registry.lookup(spec.primary) {
            let existing_type = existing.fixed_type().ok_or_else(|| CoreError::Clash {
                class: "primary class".to_string(),
                existing: "<instance-typed>".to_string(),
                incoming: spec.name.clone(),
            })?;
            if existing_type.name() == spec.name {
                return Ok(existing_type);
            }
            return Err(CoreError::Clash {
                class: "primary class".to_string(),
                existing: existing_type.name().to_string(),
                incoming: spec.name,
            });
        }
        for &adopted in &spec.adopted {
            if registry.lookup(adopted).is_some() {
                return Err(CoreError::AdoptedClassOverlap {
                    class: format!("{:?}", adopted),
                    owner: spec.name.clone(),
                });
            }
        }

        trace!(target: "pytype_core::factory", "step 1: no existing publication clashes with '{}'", spec.name);

        // Step 2: allocate the partial type.
        let variant = if spec.flags.contains(pytype::TypeFlags::REPLACEABLE) {
            Variant::Replaceable
        } else if !spec.adopted.is_empty() {
            Variant::Adoptive
        } else {
            Variant::Simple
        };
        let mut self_classes = vec![spec.primary];
        self_classes.extend(spec.adopted.iter().copied());
        self_classes.extend(spec.accepted.iter().copied());

        let partial = PyType::new_partial(
            spec.name.clone(),
            variant,
            spec.primary,
            self_classes.clone(),
            spec.bases.clone(),
            spec.flags,
            spec.doc.clone(),
        );
        trace!(target: "pytype_core::factory", "step 2: allocated partial type '{}'", spec.name);

        // Step 3: enter the work table before scanning, so re-entrant
        // construction triggered by field initialisers can see it.
        {
            let mut table = self.work_table.lock();
            for &class in &self_classes {
                table.insert(class, partial.clone());
            }
        }
        trace!(target: "pytype_core::factory", "step 3: '{}' entered the work table", spec.name);

        // Step 4: populate the dispatch vector and descriptors from the
        // explicit registration the spec carries (design notes option (a) --
        // no reflection, since Rust has none at runtime).
        let mut dispatch = DispatchVector::empty();
        for (slot, handle) in spec.specials {
            dispatch.set(slot, handle);
        }
        for (name, descriptor) in spec.descriptors {
            partial.insert_descriptor(name, descriptor);
        }
        for (host_class, handle) in spec.constructors {
            partial.insert_constructor(host_class, handle);
        }
        trace!(target: "pytype_core::factory", "step 4: populated dispatch vector and descriptors for '{}'", spec.name);

        // Step 5: MRO by C3 linearisation.
        let mro = pytype::compute_mro(&partial, &spec.bases)?;
        partial.set_mro(mro.clone());
        trace!(target: "pytype_core::factory", "step 5: linearised MRO for '{}' ({} entries)", spec.name, mro.len());

        // Step 6: inherit slots not directly provided, walking the MRO.
        for slot in SpecialMethod::all() {
            if dispatch.is_set(slot) {
                continue;
            }
            if let Some(inherited) = mro
                .iter()
                .skip(1)
                .map(|t| t.dispatch_vector().get(slot).clone())
                .find(|h| !h.is_empty())
            {
                dispatch.set(slot, inherited);
            }
        }
        partial.set_dispatch_vector(dispatch);
        trace!(target: "pytype_core::factory", "step 6: inherited remaining slots for '{}'", spec.name);

        // Step 7: publish one Representation per primary+adopted class.
        let type_source = match spec.instance_type_resolver {
            Some(resolver) => TypeSource::FromInstance(resolver),
            None => TypeSource::Fixed(partial.clone()),
        };
        let mut publish_classes = vec![spec.primary];
        publish_classes.extend(spec.adopted.iter().copied());
        for class in publish_classes {
            let repr = Representation::new(class, partial.dispatch_vector(), type_source.clone(), self_classes.clone());
            registry.publish(class, repr)?;
        }
        trace!(target: "pytype_core::factory", "step 7: published representation(s) for '{}'", spec.name);

        {
            let mut table = self.work_table.lock();
            for &class in &self_classes {
                table.shift_remove(&class);
            }
        }

        // Step 8: factory lock releases on guard drop.
        trace!(target: "pytype_core::factory", "step 8: '{}' left the work table, releasing factory lock", spec.name);
        Ok(partial)
    }

    /// Registry callback for an unknown host class (§4.3's discovery
    /// policy). This crate has no runtime class-hierarchy reflection to walk
    /// (unlike a host with `Class.getSuperclass()`), so it goes straight to
    /// the policy's final fallback: a synthetic representation mapping the
    /// class to the root `object` type.
    pub fn find_or_create(&self, host_class: HostClass, registry: &TypeRegistry) -> Result<Representation, CoreError> {
        let _guard = self.lock.lock();
        if let Some(repr) = registry.lookup(host_class) {
            return Ok(repr);
        }
        let object_type = self
            .root_object
            .get()
            .expect("find_or_create called before bootstrap installed the root object type")
            .clone();
        debug!(
            target: "pytype_core::factory",
            "no host-class superclass walk available; falling back to synthetic 'object' representation for {:?}",
            host_class
        );
        let repr = Representation::new(
            host_class,
            DispatchVector::empty(),
            TypeSource::Fixed(object_type),
            vec![host_class],
        );
        registry.publish(host_class, repr.clone())?;
        Ok(repr)
    }
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Runtime;
    use crate::spec::TypeSpec;
    use std::any::TypeId;

    struct Widget;

    #[test]
    fn from_spec_is_idempotent_for_equal_spec() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let spec = TypeSpec::new("demo.Widget", TypeId::of::<Widget>()).base(object);
        let t1 = rt.factory().from_spec(spec, rt.registry()).unwrap();
        let spec2 = TypeSpec::new("demo.Widget", TypeId::of::<Widget>());
        let t2 = rt.factory().from_spec(spec2, rt.registry()).unwrap();
        assert!(std::sync::Arc::ptr_eq(&t1, &t2));
    }

    #[test]
    fn from_spec_clash_on_disagreeing_name() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let spec = TypeSpec::new("demo.Widget", TypeId::of::<Widget>()).base(object.clone());
        rt.factory().from_spec(spec, rt.registry()).unwrap();
        let spec2 = TypeSpec::new("demo.OtherWidget", TypeId::of::<Widget>()).base(object);
        let err = rt.factory().from_spec(spec2, rt.registry()).unwrap_err();
        assert!(matches!(err, CoreError::Clash { .. }));
    }
}
