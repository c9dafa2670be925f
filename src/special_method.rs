//! The closed catalogue of special method slots.
//!
//! Modelled on `SLOT_DEFS` in RustPython's `types::slot` module: a fixed,
//! ordered table of named dispatch points, each carrying a canonical
//! [`Signature`] and (for binary operators) its reflected counterpart.
//! [`crate::factory::TypeFactory`] walks this table in order to build a
//! [`crate::representation::Representation`]'s dispatch vector; the table's
//! order is what makes that walk deterministic across runs.

/// The canonical shape of a slot's handler.
///
/// This stands in for RustPython's family of `tp_`-prefixed function pointer
/// typedefs (`HashFunc`, `GenericMethod`, `StringifyFunc`, `GetattroFunc`,
/// ...); see [`crate::slots::Handle`] for the corresponding runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// `(self) -> Object`
    Unary,
    /// `(self, other) -> Object`, used for binary arithmetic and rich comparison.
    Binary,
    /// `(self, args, kwargs) -> Object`
    Call,
    /// `(self, name) -> Object`
    GetAttr,
    /// `(self, name, value_or_delete) -> ()`
    SetAttr,
    /// `(cls, args, kwargs) -> Object`
    New,
    /// `(self, args, kwargs) -> ()`
    Init,
    /// `(self, item) -> bool`
    Contains,
    /// `(self) -> isize`
    Len,
    /// `(self) -> u64`
    Hash,
}

/// A single named slot in the catalogue.
///
/// Two entries never share a name (enforced by [`SLOT_DEFS`] being
/// hand-authored once, and exercised by `test_catalogue_names_are_unique`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum SpecialMethod {
    Lt = 0,
    Le = 1,
    Eq = 2,
    Ne = 3,
    Gt = 4,
    Ge = 5,
    Add = 6,
    RAdd = 7,
    Sub = 8,
    RSub = 9,
    Mul = 10,
    RMul = 11,
    Call = 12,
    GetAttr = 13,
    GetAttribute = 14,
    SetAttr = 15,
    DelAttr = 16,
    Iter = 17,
    Next = 18,
    Str = 19,
    Repr = 20,
    Hash = 21,
    Bool = 22,
    Len = 23,
    Contains = 24,
    GetItem = 25,
    SetItem = 26,
    New = 27,
    Init = 28,
    /// Exception-matching comparison. Per the design notes this is left
    /// deliberately unimplemented: dispatch always reports [`Empty`](crate::error::Empty).
    ExcMatch = 29,
}

/// Total number of slots in the catalogue; sizes the dispatch vector array.
pub const SLOT_COUNT: usize = 30;


struct SlotDef {
    slot: SpecialMethod,
    name: &'static str,
    signature: Signature,
    is_binary_op: bool,
    reflected: Option<SpecialMethod>,
}

macro_rules! slot_defs {
    ($($slot:ident => ($name:literal, $sig:ident $(, reflects $reflected:ident)?),)*) => {
        const SLOT_DEFS: &[SlotDef] = &[
            $(
                SlotDef {
                    slot: SpecialMethod::$slot,
                    name: $name,
                    signature: Signature::$sig,
                    is_binary_op: matches!(Signature::$sig, Signature::Binary),
                    reflected: slot_defs!(@reflected $($reflected)?),
                },
            )*
        ];
    };
    (@reflected) => { None };
    (@reflected $reflected:ident) => { Some(SpecialMethod::$reflected) };
}

slot_defs! {
    Lt => ("__lt__", Binary, reflects Gt),
    Le => ("__le__", Binary, reflects Ge),
    Eq => ("__eq__", Binary, reflects Eq),
    Ne => ("__ne__", Binary, reflects Ne),
    Gt => ("__gt__", Binary, reflects Lt),
    Ge => ("__ge__", Binary, reflects Le),
    Add => ("__add__", Binary, reflects RAdd),
    RAdd => ("__radd__", Binary, reflects Add),
    Sub => ("__sub__", Binary, reflects RSub),
    RSub => ("__rsub__", Binary, reflects Sub),
    Mul => ("__mul__", Binary, reflects RMul),
    RMul => ("__rmul__", Binary, reflects Mul),
    Call => ("__call__", Call),
    GetAttr => ("__getattr__", GetAttr),
    GetAttribute => ("__getattribute__", GetAttr),
    SetAttr => ("__setattr__", SetAttr),
    DelAttr => ("__delattr__", SetAttr),
    Iter => ("__iter__", Unary),
    Next => ("__next__", Unary),
    Str => ("__str__", Unary),
    Repr => ("__repr__", Unary),
    Hash => ("__hash__", Hash),
    Bool => ("__bool__", Unary),
    Len => ("__len__", Len),
    Contains => ("__contains__", Contains),
    GetItem => ("__getitem__", Binary),
    SetItem => ("__setitem__", Binary),
    New => ("__new__", New),
    Init => ("__init__", Init),
    ExcMatch => ("__exc_match__", Binary),
}

static_assertions::const_assert_eq!(SLOT_COUNT, SLOT_DEFS.len());

impl SpecialMethod {
    fn def(self) -> &'static SlotDef {
        SLOT_DEFS
            .iter()
            .find(|d| d.slot == self)
            .expect("SLOT_DEFS is exhaustive over SpecialMethod")
    }

    /// The dunder name this slot dispatches (e.g. `"__add__"`).
    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// The canonical call shape for this slot's handler.
    pub fn signature(self) -> Signature {
        self.def().signature
    }

    /// Whether this is a binary arithmetic/comparison operator, i.e. one
    /// that participates in the subtype-first reflected-operand dance.
    pub fn is_binary_op(self) -> bool {
        self.def().is_binary_op
    }

    /// The reflected counterpart of a binary operator slot, if any.
    ///
    /// `__lt__` reflects to `__gt__`, `__add__` to `__radd__`, `__eq__` to
    /// itself, and so on.
    pub fn reflected(self) -> Option<SpecialMethod> {
        self.def().reflected
    }

    /// Look up a slot by its dunder name.
    pub fn by_name(name: &str) -> Option<SpecialMethod> {
        SLOT_DEFS.iter().find(|d| d.name == name).map(|d| d.slot)
    }

    /// Iterate the catalogue in its stable, declared order.
    ///
    /// [`crate::factory::TypeFactory`] relies on this order to build
    /// dispatch vectors deterministically.
    pub fn all() -> impl Iterator<Item = SpecialMethod> {
        SLOT_DEFS.iter().map(|d| d.slot)
    }

    /// The slot's position in the dispatch vector array.
    ///
    /// Preferred over a map lookup on the hot dispatch path, per the design
    /// notes ("prefer an array-of-handles indexed by class-slot").
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalogue_names_are_unique() {
        let names: HashSet<_> = SpecialMethod::all().map(SpecialMethod::name).collect();
        assert_eq!(names.len(), SLOT_DEFS.len());
    }

    #[test]
    fn reflected_pairs_are_symmetric() {
        for slot in SpecialMethod::all() {
            if let Some(r) = slot.reflected() {
                assert_eq!(r.reflected(), Some(slot), "{:?} <-> {:?} not symmetric", slot, r);
            }
        }
    }

    #[test]
    fn lookup_by_name_round_trips() {
        for slot in SpecialMethod::all() {
            assert_eq!(SpecialMethod::by_name(slot.name()), Some(slot));
        }
    }

    #[test]
    fn exc_match_has_no_dispatch_meaning() {
        // Open question resolved per the design notes: treat as unimplemented.
        assert!(SpecialMethod::ExcMatch.reflected().is_none());
    }
}
