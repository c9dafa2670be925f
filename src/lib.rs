//! Object and type subsystem for a Python-compatible runtime.
//!
//! This crate is the type factory / type registry / representation model:
//! it maps host values to Python types, builds `type` objects from
//! declarative specs, bootstraps the mutually-dependent `type`/`object`
//! pair, and dispatches special methods with Python's subtyping and
//! comparison-fallback rules. It does not evaluate Python code, define a
//! bytecode interpreter, or implement any built-in type's body -- those are
//! external collaborators, named here only by the contract this crate
//! expects of them.
//!
//! Start at [`bootstrap::Runtime`]: one handle owns a [`factory::TypeFactory`]
//! and a [`registry::TypeRegistry`] and lazily bootstraps `type`/`object`/
//! `str`/`float`/`int`/`bool` on first use.

pub mod bootstrap;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod object;
pub mod pytype;
pub mod registry;
pub mod representation;
pub mod slots;
pub mod special_method;
pub mod spec;

pub use bootstrap::{Runtime, RootTypes};
pub use error::{CoreError, Empty, PyErr, PyExcKind, SlotResult};
pub use object::{HostClass, PyObjectRef, PyPayload};
pub use pytype::{Descriptor, PyType, PyTypeRef, TypeFlags, Variant};
pub use representation::{Representation, TypeSource};
pub use slots::{DispatchVector, Handle};
pub use special_method::{Signature, SpecialMethod, SLOT_COUNT};
pub use spec::{Feature, TypeSpec};
