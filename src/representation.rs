//! The per-host-class value the registry caches: dispatch vector plus a
//! way to recover the owning [`PyTypeRef`].
//!
//! Grounded in `object::payload::PyObjectPayload` (the "what is my type"
//! question) and `class::StaticType` (most representations answer with a
//! fixed type; only `type` itself answers by reading the instance).

use std::sync::Arc;

use crate::object::{HostClass, PyObjectRef};
use crate::pytype::PyTypeRef;
use crate::slots::{DispatchVector, Handle};
use crate::special_method::SpecialMethod;

/// How a representation answers `python_type(instance)`.
#[derive(Clone)]
pub enum TypeSource {
    /// The common case: every instance of this host class has the same
    /// Python type.
    Fixed(PyTypeRef),
    /// The instance-typed case (Python `type` itself, and any other type
    /// whose instances carry their own `PyTypeRef`): read it off the
    /// instance rather than answering with a constant.
    FromInstance(Arc<dyn Fn(&PyObjectRef) -> PyTypeRef + Send + Sync>),
}

/// The value looked up per host class (§4.2).
#[derive(Clone)]
pub struct Representation {
    primary_class: HostClass,
    dispatch: DispatchVector,
    type_source: TypeSource,
    self_classes: Vec<HostClass>,
}

impl Representation {
    pub fn new(
        primary_class: HostClass,
        dispatch: DispatchVector,
        type_source: TypeSource,
        self_classes: Vec<HostClass>,
    ) -> Self {
        Self {
            primary_class,
            dispatch,
            type_source,
            self_classes,
        }
    }

    pub fn primary_class(&self) -> HostClass {
        self.primary_class
    }

    /// Returns the Python type of `instance`, whose host class must be this
    /// representation's host class.
    pub fn python_type(&self, instance: &PyObjectRef) -> PyTypeRef {
        match &self.type_source {
            TypeSource::Fixed(t) => t.clone(),
            TypeSource::FromInstance(f) => f(instance),
        }
    }

    /// The fixed type answer, without needing a live instance. `None` for
    /// instance-typed representations (only `type` itself, in practice).
    pub fn fixed_type(&self) -> Option<PyTypeRef> {
        match &self.type_source {
            TypeSource::Fixed(t) => Some(t.clone()),
            TypeSource::FromInstance(_) => None,
        }
    }

    /// Always non-null: an unimplemented slot carries [`Handle::Empty`].
    pub fn slot(&self, slot: SpecialMethod) -> &Handle {
        self.dispatch.get(slot)
    }

    /// Host classes legally acceptable as `self` for this type's methods.
    pub fn self_classes(&self) -> &[HostClass] {
        &self.self_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[test]
    fn fixed_type_source_ignores_instance() {
        let object = crate::pytype::PyType::new_partial(
            "object",
            crate::pytype::Variant::Simple,
            TypeId::of::<()>(),
            vec![],
            vec![],
            crate::pytype::TypeFlags::empty(),
            None,
        );
        let repr = Representation::new(
            TypeId::of::<i64>(),
            DispatchVector::empty(),
            TypeSource::Fixed(object.clone()),
            vec![TypeId::of::<i64>()],
        );
        let obj = PyObjectRef::new(5i64, object.clone());
        assert!(std::sync::Arc::ptr_eq(&repr.python_type(&obj), &object));
    }

    #[test]
    fn unimplemented_slot_is_empty() {
        let object = crate::pytype::PyType::new_partial(
            "object",
            crate::pytype::Variant::Simple,
            TypeId::of::<()>(),
            vec![],
            vec![],
            crate::pytype::TypeFlags::empty(),
            None,
        );
        let repr = Representation::new(
            TypeId::of::<i64>(),
            DispatchVector::empty(),
            TypeSource::Fixed(object),
            vec![TypeId::of::<i64>()],
        );
        assert!(repr.slot(SpecialMethod::Add).is_empty());
    }
}
