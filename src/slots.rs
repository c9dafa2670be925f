//! Dispatch handles and the per-representation dispatch vector.
//!
//! Stands in for RustPython's `PyTypeSlots` / `atomic_func!` machinery
//! (`types::slot`): there, each slot is a distinctly-typed function pointer
//! behind an `AtomicCell`. Here every slot carries the same erased `Handle`
//! shape -- a deliberate simplification, since this crate has no bytecode
//! interpreter supplying strongly-typed call sites (out of scope per the
//! spec). What's kept is the array-of-handles layout the design notes ask
//! for: `DispatchVector` is `[Handle; SLOT_COUNT]`, indexed by
//! [`SpecialMethod::index`].

use std::fmt;
use std::sync::Arc;

use crate::error::{Empty, SlotResult};
use crate::object::PyObjectRef;
use crate::special_method::{SpecialMethod, SLOT_COUNT};

/// A dispatch handle: either the empty marker (§4.1) or a callable.
///
/// `(self, args) -> SlotResult<PyObjectRef>` is the one calling convention
/// every slot shares in this crate; `SpecialMethod::signature` documents the
/// shape callers are expected to respect when filling `args`.
#[derive(Clone)]
pub enum Handle {
    Empty,
    Fn(Arc<dyn Fn(&PyObjectRef, &[PyObjectRef]) -> SlotResult<PyObjectRef> + Send + Sync>),
}

impl Handle {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PyObjectRef, &[PyObjectRef]) -> SlotResult<PyObjectRef> + Send + Sync + 'static,
    {
        Handle::Fn(Arc::new(f))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Handle::Empty)
    }

    /// Invoke the handle, or report [`Empty`] if the slot is unimplemented.
    pub fn call(&self, zelf: &PyObjectRef, args: &[PyObjectRef]) -> SlotResult<PyObjectRef> {
        match self {
            Handle::Empty => Err(Empty),
            Handle::Fn(f) => f(zelf, args),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Empty => f.write_str("Handle::Empty"),
            Handle::Fn(_) => f.write_str("Handle::Fn(..)"),
        }
    }
}

/// An immutable dispatch vector: one [`Handle`] per [`SpecialMethod`].
///
/// Built once by [`crate::factory::TypeFactory`] and never mutated after
/// construction, per the data model's "immutable dispatch vector" invariant.
#[derive(Clone)]
pub struct DispatchVector {
    slots: [Handle; SLOT_COUNT],
}

impl DispatchVector {
    /// All slots empty; the factory fills this in while walking the MRO.
    pub fn empty() -> Self {
        Self {
            slots: std::array::from_fn(|_| Handle::Empty),
        }
    }

    pub fn get(&self, slot: SpecialMethod) -> &Handle {
        &self.slots[slot.index()]
    }

    pub fn set(&mut self, slot: SpecialMethod, handle: Handle) {
        self.slots[slot.index()] = handle;
    }

    pub fn is_set(&self, slot: SpecialMethod) -> bool {
        !self.get(slot).is_empty()
    }
}

impl fmt::Debug for DispatchVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<_> = SpecialMethod::all().filter(|s| self.is_set(*s)).map(SpecialMethod::name).collect();
        f.debug_struct("DispatchVector").field("set", &set).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vector_is_all_empty() {
        let v = DispatchVector::empty();
        for slot in SpecialMethod::all() {
            assert!(!v.is_set(slot));
        }
    }

    #[test]
    fn set_slot_is_observable() {
        let mut v = DispatchVector::empty();
        v.set(SpecialMethod::Len, Handle::new(|_zelf, _args| Err(Empty)));
        assert!(v.is_set(SpecialMethod::Len));
        assert!(!v.is_set(SpecialMethod::Hash));
    }
}
