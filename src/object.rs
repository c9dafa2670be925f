//! Type-erased instance handles.
//!
//! Stands in for the "arbitrary host object" half of the spec's purpose:
//! a [`PyObjectRef`] wraps any Rust value that has been adopted into the
//! runtime, tagged with its [`HostClass`] (for [`crate::registry::TypeRegistry`]
//! lookups) and the [`PyTypeRef`] it was constructed with (for the common
//! case where an instance carries its own type, e.g. `type` itself -- see
//! [`crate::representation::TypeSource::FromInstance`]).
//!
//! Modelled on the `Py<T>` / `PyObjectPayload` split in RustPython's
//! `object::core`, minus the raw-pointer object layout: that machinery
//! exists there to give CPython-compatible memory layout and a garbage
//! collector, neither of which this core needs (out of scope: the bytecode
//! interpreter and its allocator). A plain `Arc<dyn Any + Send + Sync>` is
//! the idiomatic Rust substitute.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::PyErr;
use crate::pytype::PyTypeRef;

/// The Rust type of a host value, as seen by the registry.
///
/// Corresponds to the "host class" of the spec's data model: a Java/Python
/// `Class` object, translated into Rust's [`TypeId`].
pub type HostClass = TypeId;

/// Marker for any value eligible to be wrapped as a Python instance.
pub trait PyPayload: Any + Send + Sync {}
impl<T: Any + Send + Sync> PyPayload for T {}

/// A reference-counted, type-erased Python instance handle.
///
/// Cloning is cheap (an `Arc` bump); identity comparison is pointer equality
/// on the underlying payload, matching CPython's `is`. The `class` cell is
/// shared across every clone, so a `__class__` reassignment (see
/// [`PyObjectRef::set_class`]) is visible through every handle to the same
/// instance -- not just the one that performed the assignment.
#[derive(Clone)]
pub struct PyObjectRef {
    class: Arc<RwLock<PyTypeRef>>,
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl PyObjectRef {
    /// Wrap `payload` as an instance of `class`.
    ///
    /// This is the construction path the factory and ordinary object
    /// creation use; the object carries its type from birth, the way every
    /// CPython object carries `ob_type`.
    pub fn new<T: PyPayload>(payload: T, class: PyTypeRef) -> Self {
        Self {
            class: Arc::new(RwLock::new(class)),
            payload: Arc::new(payload),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The Python type this instance currently carries.
    ///
    /// Every handle sharing this instance (every clone) observes the same
    /// answer, including after a [`PyObjectRef::set_class`] performed
    /// through any other handle.
    pub fn class(&self) -> PyTypeRef {
        self.class.read().clone()
    }

    /// `__class__` reassignment (§4.6): replaces this instance's type with
    /// `new_class`, permitted only between `Replaceable` types that share a
    /// primary host class. Leaves the instance unchanged and returns a
    /// `TypeError` naming both types otherwise.
    pub fn set_class(&self, new_class: PyTypeRef) -> Result<(), PyErr> {
        let mut current = self.class.write();
        current.check_class_reassignment(&new_class)?;
        *current = new_class;
        Ok(())
    }

    /// The underlying Rust type, keyed for [`crate::registry::TypeRegistry`].
    pub fn host_class(&self) -> HostClass {
        (*self.payload).type_id()
    }

    /// Reference identity, CPython's `is`.
    pub fn is(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    /// Borrow the payload as `T`, or `None` if this instance wraps a
    /// different host class.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Take ownership of the payload as `Arc<T>`, or hand `self` back
    /// unchanged if the host class doesn't match.
    pub fn downcast<T: Send + Sync + 'static>(self) -> Result<Arc<T>, Self> {
        match Arc::clone(&self.payload).downcast::<T>() {
            Ok(typed) => Ok(typed),
            Err(_) => Err(self),
        }
    }
}

impl fmt::Debug for PyObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyObjectRef")
            .field("host_type", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Runtime;

    #[test]
    fn downcast_ref_matches_host_class() {
        let rt = Runtime::new();
        let obj = PyObjectRef::new(42i64, rt.types().object.clone());
        assert_eq!(obj.downcast_ref::<i64>(), Some(&42));
        assert_eq!(obj.downcast_ref::<&str>(), None);
    }

    #[test]
    fn clones_share_identity() {
        let rt = Runtime::new();
        let obj = PyObjectRef::new("hello".to_string(), rt.types().object.clone());
        let clone = obj.clone();
        assert!(obj.is(&clone));
    }

    fn replaceable(name: &str, primary_class: crate::object::HostClass, object: PyTypeRef) -> PyTypeRef {
        crate::pytype::PyType::new_partial(
            name,
            crate::pytype::Variant::Replaceable,
            primary_class,
            vec![primary_class],
            vec![object],
            crate::pytype::TypeFlags::REPLACEABLE,
            None,
        )
    }

    // §8 scenario 5: both C1 and C2 are `Replaceable` with the same primary
    // host class; reassignment succeeds and is visible through every clone.
    #[test]
    fn class_reassignment_succeeds_for_compatible_replaceable_types() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let x = TypeId::of::<Vec<u8>>();
        let c1 = replaceable("C1", x, object.clone());
        let c2 = replaceable("C2", x, object);

        let obj = PyObjectRef::new(Vec::<u8>::new(), c1);
        let clone = obj.clone();
        obj.set_class(c2.clone()).unwrap();

        assert!(Arc::ptr_eq(&obj.class(), &c2));
        assert!(Arc::ptr_eq(&clone.class(), &c2));
    }

    // §8 scenario 6: C3's primary host class differs from C1's; reassignment
    // is rejected and the instance keeps its original type.
    #[test]
    fn class_reassignment_rejects_mismatched_primary_host_class() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let c1 = replaceable("C1", TypeId::of::<Vec<u8>>(), object.clone());
        let c3 = replaceable("C3", TypeId::of::<String>(), object);

        let obj = PyObjectRef::new(Vec::<u8>::new(), c1.clone());
        let err = obj.set_class(c3).unwrap_err();

        assert!(err.message.contains("C1"));
        assert!(err.message.contains("C3"));
        assert!(Arc::ptr_eq(&obj.class(), &c1));
    }
}
