//! The Python-visible type object and its three variants.
//!
//! Grounded in `builtins::type::PyType` and its `linearise_mro`/`take_next_base`
//! C3 algorithm, and in `types::slot::PyTypeFlags` for the feature-flag
//! bitset. The cyclic "`type` is its own type" identity is modelled per the
//! design notes: a `OnceCell<PyTypeRef>` field filled once by bootstrap,
//! never touched again.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::{CoreError, PyErr};
use crate::object::HostClass;
use crate::slots::{DispatchVector, Handle};
use crate::special_method::SpecialMethod;

bitflags! {
    /// Feature flags named by [`crate::spec::TypeSpec::add`]/`remove`, plus
    /// the derived predicates `is_sequence`/`is_iterable`/... cached here
    /// once slots are known.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TypeFlags: u32 {
        const IMMUTABLE    = 1 << 0;
        const REPLACEABLE  = 1 << 1;
        const INSTANTIABLE = 1 << 2;
        const SEQUENCE     = 1 << 3;
        const ITERABLE     = 1 << 4;
        const ITERATOR     = 1 << 5;
        const DESCRIPTOR   = 1 << 6;
        const DATA_DESCRIPTOR  = 1 << 7;
        const METHOD_DESCRIPTOR = 1 << 8;
        const MUTABLE      = 1 << 9;
    }
}

/// A capability-variant descriptor, replacing virtual inheritance over
/// `{Method, Member, GetSet, Wrapper}` per the design notes.
#[derive(Clone)]
pub enum Descriptor {
    Method { objclass: HostClass, handle: Handle },
    Member { objclass: HostClass, handle: Handle },
    GetSet {
        objclass: HostClass,
        getter: Handle,
        setter: Option<Handle>,
    },
    Wrapper { objclass: HostClass, slot: SpecialMethod },
}

impl Descriptor {
    pub fn objclass(&self) -> HostClass {
        match self {
            Descriptor::Method { objclass, .. }
            | Descriptor::Member { objclass, .. }
            | Descriptor::GetSet { objclass, .. }
            | Descriptor::Wrapper { objclass, .. } => *objclass,
        }
    }
}

/// Which of the three shapes from §4.6 a `PyType` takes.
#[derive(Clone, Debug)]
pub enum Variant {
    /// One primary host class, one `Representation`.
    Simple,
    /// Several adopted host classes share this type; `self_classes` lists
    /// all of them, primary first.
    Adoptive,
    /// Admits `__class__` reassignment among types with the same primary
    /// host class.
    Replaceable,
}

pub type PyTypeRef = Arc<PyType>;

/// The Python-visible type object.
pub struct PyType {
    pub name: String,
    pub variant: Variant,
    pub primary_class: HostClass,
    /// Primary first, then adopted, then accepted -- §3's `self_classes`.
    pub self_classes: Vec<HostClass>,
    pub bases: Vec<PyTypeRef>,
    /// `None` until the factory computes it (partial construction, §4.5
    /// step 2-3); `is_subtype_of` falls back to walking `bases` until then.
    mro: RwLock<Option<Vec<PyTypeRef>>>,
    flags: RwLock<TypeFlags>,
    dict: RwLock<IndexMap<String, Descriptor, ahash::RandomState>>,
    slots: RwLock<DispatchVector>,
    constructors: RwLock<IndexMap<HostClass, Handle, ahash::RandomState>>,
    doc: Option<String>,
    /// Cyclic identity: `type`'s own metatype is `type` itself. Filled once
    /// by the bootstrap controller after `type` exists, then frozen.
    metatype: OnceCell<PyTypeRef>,
}

impl PyType {
    pub(crate) fn new_partial(
        name: impl Into<String>,
        variant: Variant,
        primary_class: HostClass,
        self_classes: Vec<HostClass>,
        bases: Vec<PyTypeRef>,
        flags: TypeFlags,
        doc: Option<String>,
    ) -> PyTypeRef {
        Arc::new(PyType {
            name: name.into(),
            variant,
            primary_class,
            self_classes,
            bases,
            mro: RwLock::new(None),
            flags: RwLock::new(flags),
            dict: RwLock::new(IndexMap::default()),
            slots: RwLock::new(DispatchVector::empty()),
            constructors: RwLock::new(IndexMap::default()),
            doc,
            metatype: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[PyTypeRef] {
        &self.bases
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// A snapshot of this type's own attribute mapping (not the MRO-joined
    /// view `lookup` provides). Mutation only ever happens through the
    /// crate-private `insert_descriptor`, so this is a read-only view from
    /// outside the crate regardless of `is_immutable()` -- per §4.6, that
    /// flag just documents the guarantee rather than gating it.
    pub fn dict(&self) -> IndexMap<String, Descriptor, ahash::RandomState> {
        self.dict.read().clone()
    }

    /// `None` while construction is in progress (§4.5 step 2-5).
    pub fn mro(&self) -> Option<Vec<PyTypeRef>> {
        self.mro.read().clone()
    }

    pub(crate) fn set_mro(&self, mro: Vec<PyTypeRef>) {
        *self.mro.write() = Some(mro);
    }

    /// The type's own type: `type` for nearly everything, and `type` itself
    /// for `type`. `None` only during the brief bootstrap window before the
    /// metatype is filled.
    pub fn type_(&self) -> Option<PyTypeRef> {
        self.metatype.get().cloned()
    }

    pub(crate) fn set_metatype(&self, metatype: PyTypeRef) {
        // Ignore: called at most once by construction, idempotent by design.
        let _ = self.metatype.set(metatype);
    }

    pub fn flags(&self) -> TypeFlags {
        *self.flags.read()
    }

    pub(crate) fn set_flags(&self, flags: TypeFlags) {
        *self.flags.write() = flags;
    }

    pub fn is_immutable(&self) -> bool {
        self.flags().contains(TypeFlags::IMMUTABLE)
    }

    pub fn is_replaceable(&self) -> bool {
        matches!(self.variant, Variant::Replaceable) || self.flags().contains(TypeFlags::REPLACEABLE)
    }

    pub fn is_sequence(&self) -> bool {
        self.flags().contains(TypeFlags::SEQUENCE)
    }

    pub fn is_iterable(&self) -> bool {
        self.flags().contains(TypeFlags::ITERABLE)
    }

    pub fn is_iterator(&self) -> bool {
        self.flags().contains(TypeFlags::ITERATOR)
    }

    pub fn is_descr(&self) -> bool {
        self.flags().contains(TypeFlags::DESCRIPTOR)
    }

    pub fn is_data_descr(&self) -> bool {
        self.flags().contains(TypeFlags::DATA_DESCRIPTOR)
    }

    pub fn is_method_descr(&self) -> bool {
        self.flags().contains(TypeFlags::METHOD_DESCRIPTOR)
    }

    pub fn is_mutable(&self) -> bool {
        self.flags().contains(TypeFlags::MUTABLE) && !self.is_immutable()
    }

    pub(crate) fn dispatch_vector(&self) -> DispatchVector {
        self.slots.read().clone()
    }

    pub(crate) fn set_dispatch_vector(&self, v: DispatchVector) {
        *self.slots.write() = v;
    }

    pub(crate) fn insert_descriptor(&self, name: impl Into<String>, descriptor: Descriptor) {
        self.dict.write().insert(name.into(), descriptor);
    }

    pub(crate) fn insert_constructor(&self, host_class: HostClass, handle: Handle) {
        self.constructors.write().insert(host_class, handle);
    }

    pub fn constructor_for(&self, host_class: HostClass) -> Option<Handle> {
        self.constructors.read().get(&host_class).cloned()
    }

    /// Walk the MRO and return the first entry for `name`; no `__get__` is
    /// invoked here (that belongs to the -- out of scope -- interpreter).
    pub fn lookup(&self, name: &str) -> Option<Descriptor> {
        if let Some(mro) = self.mro() {
            for t in &mro {
                if let Some(d) = t.dict.read().get(name) {
                    return Some(d.clone());
                }
            }
            None
        } else {
            // Partial construction: fall back to walking `bases` directly.
            if let Some(d) = self.dict.read().get(name) {
                return Some(d.clone());
            }
            for base in &self.bases {
                if let Some(d) = base.lookup(name) {
                    return Some(d);
                }
            }
            None
        }
    }

    /// `is_subtype_of` must be total even on partial types (no MRO yet):
    /// fall back to walking `base` pointers to the root, per §4.6.
    pub fn is_subtype_of(&self, other: &PyType) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if let Some(mro) = self.mro() {
            return mro.iter().any(|t| std::ptr::eq(t.as_ref(), other));
        }
        self.bases
            .iter()
            .any(|b| std::ptr::eq(b.as_ref(), other) || b.is_subtype_of(other))
    }

    pub fn check(&self, obj_type: &PyTypeRef) -> bool {
        obj_type.is_subtype_of(self)
    }

    pub fn check_exact(&self, obj_type: &PyTypeRef) -> bool {
        std::ptr::eq(self, obj_type.as_ref())
    }

    /// `__class__` reassignment check (§4.6): `self` is the instance's
    /// current type, `new_type` the proposed replacement. Permitted iff
    /// `self` is `Replaceable` and `new_type`'s primary host class equals
    /// `self`'s; otherwise a `TypeError` naming both types.
    pub fn check_class_reassignment(&self, new_type: &PyType) -> Result<(), PyErr> {
        if !self.is_replaceable() {
            return Err(PyErr::type_error(format!(
                "__class__ assignment only supported for replaceable types, not '{}'",
                self.name
            )));
        }
        if new_type.primary_class != self.primary_class {
            return Err(PyErr::type_error(format!(
                "__class__ assignment: '{}' object layout differs from '{}'",
                new_type.name, self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyType")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .finish()
    }
}

/// C3 linearisation over each base's own MRO, port of `linearise_mro`.
///
/// `bases` is the list of each declared base's full MRO (base-then-its-MRO,
/// not yet merged); `declared_bases` is the declared base list itself,
/// appended as the final merge input so bases appear in declaration order
/// when otherwise unconstrained.
pub(crate) fn linearise_mro(mut sequences: Vec<Vec<PyTypeRef>>) -> Result<Vec<PyTypeRef>, CoreError> {
    fn take_next_head(sequences: &[Vec<PyTypeRef>]) -> Option<PyTypeRef> {
        for seq in sequences {
            let head = seq[0].clone();
            let blocked = sequences
                .iter()
                .any(|s| s[1..].iter().any(|t| Arc::ptr_eq(t, &head)));
            if !blocked {
                return Some(head);
            }
        }
        None
    }

    let mut result = Vec::new();
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(result);
        }
        let head = take_next_head(&sequences).ok_or_else(|| {
            let names: Vec<_> = sequences.iter().map(|s| s[0].name.clone()).collect();
            CoreError::MroConflict(names.join(", "))
        })?;
        result.push(head.clone());
        for seq in sequences.iter_mut() {
            if Arc::ptr_eq(&seq[0], &head) {
                seq.remove(0);
            }
        }
    }
}

/// Compute the MRO for a new type from its own identity and declared bases.
pub(crate) fn compute_mro(new_type: &PyTypeRef, bases: &[PyTypeRef]) -> Result<Vec<PyTypeRef>, CoreError> {
    if bases.is_empty() {
        return Ok(vec![new_type.clone()]);
    }
    let mut sequences: Vec<Vec<PyTypeRef>> = bases
        .iter()
        .map(|b| b.mro().unwrap_or_else(|| vec![b.clone()]))
        .collect();
    sequences.push(bases.to_vec());
    let mut mro = vec![new_type.clone()];
    mro.extend(linearise_mro(sequences)?);
    Ok(mro)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn leaf(name: &str, bases: Vec<PyTypeRef>) -> PyTypeRef {
        let t = PyType::new_partial(
            name,
            Variant::Simple,
            TypeId::of::<()>(),
            vec![],
            bases.clone(),
            TypeFlags::empty(),
            None,
        );
        let mro = compute_mro(&t, &bases).unwrap();
        t.set_mro(mro);
        t
    }

    #[test]
    fn diamond_mro_matches_c3() {
        let object = leaf("object", vec![]);
        let a = leaf("A", vec![object.clone()]);
        let b = leaf("B", vec![object.clone()]);
        let c = leaf("C", vec![a.clone(), b.clone()]);
        let names: Vec<_> = c.mro().unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["C", "A", "B", "object"]);
    }

    #[test]
    fn mro_starts_with_self_and_ends_with_object() {
        let object = leaf("object", vec![]);
        let a = leaf("A", vec![object.clone()]);
        let mro = a.mro().unwrap();
        assert!(Arc::ptr_eq(&mro[0], &a));
        assert!(Arc::ptr_eq(mro.last().unwrap(), &object));
    }

    #[test]
    fn inconsistent_bases_conflict() {
        let object = leaf("object", vec![]);
        let a = leaf("A", vec![object.clone()]);
        let b = leaf("B", vec![object.clone()]);
        // Force an order inconsistent with A's and B's own MRO.
        let bad_bases = vec![a.clone(), b.clone()];
        let mut seqs: Vec<Vec<PyTypeRef>> = bad_bases.iter().map(|x| x.mro().unwrap()).collect();
        // Reverse one sequence to manufacture a genuine conflict.
        seqs.push(vec![b.clone(), a.clone()]);
        assert!(linearise_mro(seqs).is_err());
    }

    #[test]
    fn is_subtype_of_walks_partial_bases() {
        let object = leaf("object", vec![]);
        let partial = PyType::new_partial(
            "Partial",
            Variant::Simple,
            TypeId::of::<()>(),
            vec![],
            vec![object.clone()],
            TypeFlags::empty(),
            None,
        );
        assert!(partial.is_subtype_of(&object));
    }
}
