//! The one-shot bootstrap controller and the `Runtime` handle that owns it.
//!
//! Grounded in `types::zoo::TypeZoo::init` (fixed construction order: `type`
//! and `object` together, then the primitives) and `class::static_cell!`
//! (the `OnceCell`-backed once-latch this crate generalises into an
//! explicit, non-global [`Runtime`] handle per the design notes' resolution
//! of "process-wide state").

use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

use log::{info, trace};
use once_cell::sync::OnceCell;

use crate::factory::TypeFactory;
use crate::object::PyObjectRef;
use crate::pytype::PyTypeRef;
use crate::registry::TypeRegistry;
use crate::spec::TypeSpec;

/// The bootstrap-type identities every `Runtime` guarantees exist once
/// [`Runtime::types`] has returned for the first time.
pub struct RootTypes {
    pub type_: PyTypeRef,
    pub object: PyTypeRef,
    pub str_: PyTypeRef,
    pub float: PyTypeRef,
    pub int: PyTypeRef,
    pub bool_: PyTypeRef,
    /// Nanoseconds from an arbitrary epoch: when bootstrap began.
    pub bootstrap_started_nanos: u128,
    /// When bootstrap completed; always `> bootstrap_started_nanos`.
    pub bootstrap_ready_nanos: u128,
}

/// An explicit, non-global owner of one factory/registry/bootstrap triple
/// (design notes, "process-wide state"). Construction is cheap; the actual
/// bootstrap sequence (§4.7) runs lazily, once, behind an internal
/// `OnceCell`, on the first call to [`Runtime::types`] -- matching "bootstrap
/// makes the type system safe to use from the first call to `PyType.of`".
pub struct Runtime {
    factory: TypeFactory,
    registry: TypeRegistry,
    root: OnceCell<RootTypes>,
    epoch: Instant,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            factory: TypeFactory::new(),
            registry: TypeRegistry::new(),
            root: OnceCell::new(),
            epoch: Instant::now(),
        }
    }

    pub fn factory(&self) -> &TypeFactory {
        &self.factory
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Triggers bootstrap on first call; every other concurrent caller
    /// blocks on the same `OnceCell` until it completes (§4.7's concurrency
    /// guarantee -- no partial type ever escapes to a second thread).
    pub fn types(&self) -> &RootTypes {
        self.root.get_or_init(|| self.bootstrap())
    }

    fn bootstrap(&self) -> RootTypes {
        let start = Instant::now();
        info!(target: "pytype_core::bootstrap", "bootstrap starting");

        // `object` has no base; nothing before it can exist.
        let object = self
            .factory
            .from_spec(TypeSpec::new("object", TypeId::of::<()>()), &self.registry)
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'object': {e}"));
        trace!(target: "pytype_core::bootstrap", "constructed root type 'object'");

        // `type`'s instances carry their own type (the cyclic identity):
        // resolve by reading the wrapped `PyTypeRef`'s own metatype, which
        // bootstrap fills in immediately below.
        let type_resolver: Arc<dyn Fn(&PyObjectRef) -> PyTypeRef + Send + Sync> = Arc::new(|obj: &PyObjectRef| {
            obj.downcast_ref::<PyTypeRef>()
                .expect("an instance of 'type' must wrap a PyTypeRef")
                .type_()
                .expect("metatype is set for every published type")
                .clone()
        });
        let type_ = self
            .factory
            .from_spec(
                TypeSpec::new("type", TypeId::of::<PyTypeRef>())
                    .base(object.clone())
                    .instance_typed(type_resolver),
                &self.registry,
            )
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'type': {e}"));
        trace!(target: "pytype_core::bootstrap", "constructed root type 'type'");

        // Close the cycle: both `type` and `object` are instances of `type`.
        object.set_metatype(type_.clone());
        type_.set_metatype(type_.clone());
        self.factory.set_root_object(object.clone());

        let str_ = self
            .factory
            .from_spec(TypeSpec::primary_of::<String>("str").base(object.clone()), &self.registry)
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'str': {e}"));
        str_.set_metatype(type_.clone());
        trace!(target: "pytype_core::bootstrap", "constructed root type 'str'");

        let float = self
            .factory
            .from_spec(TypeSpec::primary_of::<f64>("float").base(object.clone()), &self.registry)
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'float': {e}"));
        float.set_metatype(type_.clone());
        trace!(target: "pytype_core::bootstrap", "constructed root type 'float'");

        // `int`'s adopted representation: both `i64` and `i32` host values
        // appear as Python `int` (§8 scenario 2's adopted-representation
        // property, specialised to two native integer widths).
        let int = self
            .factory
            .from_spec(
                TypeSpec::primary_of::<i64>("int").adopt_of::<i32>().base(object.clone()),
                &self.registry,
            )
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'int': {e}"));
        int.set_metatype(type_.clone());
        trace!(target: "pytype_core::bootstrap", "constructed root type 'int'");

        let bool_ = self
            .factory
            .from_spec(TypeSpec::primary_of::<bool>("bool").base(int.clone()), &self.registry)
            .unwrap_or_else(|e| panic!("bootstrap cannot construct 'bool': {e}"));
        bool_.set_metatype(type_.clone());
        trace!(target: "pytype_core::bootstrap", "constructed root type 'bool'");

        let ready = Instant::now();
        info!(
            target: "pytype_core::bootstrap",
            "bootstrap ready in {:?}",
            ready.duration_since(start)
        );

        RootTypes {
            type_,
            object,
            str_,
            float,
            int,
            bool_,
            bootstrap_started_nanos: start.duration_since(self.epoch).as_nanos(),
            bootstrap_ready_nanos: ready.duration_since(self.epoch).as_nanos(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn bootstrap_is_single_threaded_under_concurrent_first_use() {
        let rt = Arc::new(Runtime::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rt = Arc::clone(&rt);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let types = rt.types();
                    (types.bootstrap_ready_nanos, types.bootstrap_started_nanos, types.str_.clone())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let (first_ready, first_started, first_str) = &results[0];
        assert!(first_ready > first_started);
        for (ready, started, str_type) in &results {
            assert_eq!(ready, first_ready);
            assert_eq!(started, first_started);
            assert!(Arc::ptr_eq(str_type, first_str));
        }
    }

    #[test]
    fn int_has_two_adopted_representations() {
        let rt = Runtime::new();
        let types = rt.types();
        let repr_i64 = rt.registry().lookup(TypeId::of::<i64>()).unwrap();
        let repr_i32 = rt.registry().lookup(TypeId::of::<i32>()).unwrap();
        let obj_i64 = PyObjectRef::new(7i64, types.int.clone());
        let obj_i32 = PyObjectRef::new(7i32, types.int.clone());
        assert!(Arc::ptr_eq(&repr_i64.python_type(&obj_i64), &types.int));
        assert!(Arc::ptr_eq(&repr_i32.python_type(&obj_i32), &types.int));
    }

    #[test]
    fn bool_is_subtype_of_int() {
        let rt = Runtime::new();
        let types = rt.types();
        assert!(types.bool_.is_subtype_of(&types.int));
    }

    #[test]
    fn type_and_object_are_instances_of_type() {
        let rt = Runtime::new();
        let types = rt.types();
        assert!(Arc::ptr_eq(&types.object.type_().unwrap(), &types.type_));
        assert!(Arc::ptr_eq(&types.type_.type_().unwrap(), &types.type_));
    }
}
