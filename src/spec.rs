//! The declarative record a Python type is built from.
//!
//! Grounded in `class::PyClassImpl::extend_class`/`add_operators`: rather
//! than RustPython's reflection over annotated Rust methods (gated by a
//! `PyThreadingConstraint`-scoped lookup token), this crate takes the design
//! notes' option (a) -- explicit, hand-authored registration. `TypeSpec`'s
//! `special`/`method`/`member`/`getset` builder calls are that registration
//! table.

use std::any::Any;
use std::sync::Arc;

use crate::object::{HostClass, PyObjectRef};
use crate::pytype::{Descriptor, PyTypeRef, TypeFlags};
use crate::slots::Handle;
use crate::special_method::SpecialMethod;

/// Feature flags recognised by `add`/`remove` (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    Immutable,
    Replaceable,
    Instantiable,
}

impl Feature {
    fn bit(self) -> TypeFlags {
        match self {
            Feature::Immutable => TypeFlags::IMMUTABLE,
            Feature::Replaceable => TypeFlags::REPLACEABLE,
            Feature::Instantiable => TypeFlags::INSTANTIABLE,
        }
    }
}

/// Custom resolver for instance-typed representations (the `type` bootstrap
/// type's instances carry their own `PyTypeRef`, answered by reading the
/// instance rather than a fixed answer).
pub type InstanceTypeResolver = Arc<dyn Fn(&PyObjectRef) -> PyTypeRef + Send + Sync>;

/// A builder collecting everything [`crate::factory::TypeFactory::from_spec`]
/// needs to construct a `PyType` (§4.4).
pub struct TypeSpec {
    pub(crate) name: String,
    pub(crate) primary: HostClass,
    pub(crate) adopted: Vec<HostClass>,
    pub(crate) accepted: Vec<HostClass>,
    pub(crate) bases: Vec<PyTypeRef>,
    pub(crate) flags: TypeFlags,
    pub(crate) doc: Option<String>,
    pub(crate) specials: Vec<(SpecialMethod, Handle)>,
    pub(crate) descriptors: Vec<(String, Descriptor)>,
    pub(crate) constructors: Vec<(HostClass, Handle)>,
    pub(crate) instance_type_resolver: Option<InstanceTypeResolver>,
}

impl TypeSpec {
    /// `name` and `primary` (mandatory host class) start the builder.
    pub fn new(name: impl Into<String>, primary: HostClass) -> Self {
        Self {
            name: name.into(),
            primary,
            adopted: Vec::new(),
            accepted: Vec::new(),
            bases: Vec::new(),
            flags: TypeFlags::empty(),
            doc: None,
            specials: Vec::new(),
            descriptors: Vec::new(),
            constructors: Vec::new(),
            instance_type_resolver: None,
        }
    }

    /// Names a host class by its `Any` type, convenience over raw `TypeId`s.
    pub fn primary_of<T: Any>(name: impl Into<String>) -> Self {
        Self::new(name, std::any::TypeId::of::<T>())
    }

    pub fn adopt(mut self, class: HostClass) -> Self {
        self.adopted.push(class);
        self
    }

    pub fn adopt_of<T: Any>(self) -> Self {
        self.adopt(std::any::TypeId::of::<T>())
    }

    pub fn accept(mut self, class: HostClass) -> Self {
        self.accepted.push(class);
        self
    }

    pub fn accept_of<T: Any>(self) -> Self {
        self.accept(std::any::TypeId::of::<T>())
    }

    pub fn base(mut self, base: PyTypeRef) -> Self {
        self.bases.push(base);
        self
    }

    pub fn bases(mut self, bases: impl IntoIterator<Item = PyTypeRef>) -> Self {
        self.bases.extend(bases);
        self
    }

    pub fn add(mut self, feature: Feature) -> Self {
        self.flags.insert(feature.bit());
        self
    }

    pub fn remove(mut self, feature: Feature) -> Self {
        self.flags.remove(feature.bit());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Registers a special-method handler directly on the primary class.
    pub fn special(mut self, slot: SpecialMethod, handle: Handle) -> Self {
        self.specials.push((slot, handle));
        self
    }

    pub fn method(mut self, name: impl Into<String>, handle: Handle) -> Self {
        self.descriptors.push((
            name.into(),
            Descriptor::Method {
                objclass: self.primary,
                handle,
            },
        ));
        self
    }

    pub fn member(mut self, name: impl Into<String>, handle: Handle) -> Self {
        self.descriptors.push((
            name.into(),
            Descriptor::Member {
                objclass: self.primary,
                handle,
            },
        ));
        self
    }

    pub fn getset(mut self, name: impl Into<String>, getter: Handle, setter: Option<Handle>) -> Self {
        self.descriptors.push((
            name.into(),
            Descriptor::GetSet {
                objclass: self.primary,
                getter,
                setter,
            },
        ));
        self
    }

    /// Registers a constructor handle callable when `host_class` (a subclass
    /// representation) is instantiated via this type's `__new__` (§4.6).
    pub fn constructor(mut self, host_class: HostClass, handle: Handle) -> Self {
        self.constructors.push((host_class, handle));
        self
    }

    /// Marks this type as instance-typed: `python_type(instance)` reads the
    /// type off the instance instead of answering with a fixed `PyTypeRef`.
    /// Used for the `type` bootstrap spec only.
    pub fn instance_typed(mut self, resolver: InstanceTypeResolver) -> Self {
        self.instance_type_resolver = Some(resolver);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_adopted_and_accepted() {
        let spec = TypeSpec::primary_of::<i64>("int")
            .adopt_of::<i32>()
            .accept_of::<bool>()
            .add(Feature::Immutable);
        assert_eq!(spec.adopted.len(), 1);
        assert_eq!(spec.accepted.len(), 1);
        assert!(spec.flags.contains(TypeFlags::IMMUTABLE));
    }
}
