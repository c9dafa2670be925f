//! Binary-operator, comparison, and containment dispatch.
//!
//! Grounded in `vm::vm_ops::{binary_op1, bool_eq, identical_or_equal}`: the
//! subtype-first reflected-operand rule for binary operators, and the
//! identity fallback for `==`/`!=` when neither side implements the
//! comparison. `protocol::sequence`'s "is not a container"/"is not callable"
//! message conventions ground the contains/call fallbacks.
//!
//! Dispatch reads the receiver's own [`PyObjectRef::class`] directly rather
//! than consulting [`crate::registry::TypeRegistry`]: every `PyObjectRef`
//! already carries its current type (set at construction, and the only
//! thing [`PyObjectRef::set_class`] ever changes), which is this crate's
//! realisation of §4.3's discovery-policy step "a crafted Python object
//! exposing its own type" -- there is no live instance for which that check
//! can fail. The registry's synthetic-`object` fallback is reserved for
//! callers (like [`crate::factory::TypeFactory::find_or_create`] itself)
//! that only have a bare host class and no instance to ask.

use std::sync::Arc;

use log::trace;

use crate::bootstrap::Runtime;
use crate::error::{Empty, PyErr, SlotResult};
use crate::object::PyObjectRef;
use crate::special_method::SpecialMethod;

/// Invokes `slot` on the receiver's own dispatch vector, reporting [`Empty`]
/// if the slot is unimplemented.
fn invoke(slot: SpecialMethod, receiver: &PyObjectRef, args: &[PyObjectRef]) -> SlotResult<PyObjectRef> {
    receiver.class().dispatch_vector().get(slot).call(receiver, args)
}

/// Tries `op` and its reflected counterpart in the order the subtype-first
/// rule demands (§8): same type, or `w` not a proper subtype of `v`'s type
/// -> forward first; `w`'s type a proper subtype of `v`'s type -> reflected
/// first. Returns [`Empty`] only if both sides decline.
fn dispatch_ordered(op: SpecialMethod, v: &PyObjectRef, w: &PyObjectRef) -> SlotResult<PyObjectRef> {
    let v_type = v.class();
    let w_type = w.class();
    let reflected = op.reflected();

    let reflected_first = reflected.is_some() && !Arc::ptr_eq(&v_type, &w_type) && w_type.is_subtype_of(&v_type);

    trace!(
        target: "pytype_core::dispatch",
        "{} on '{}' and '{}': trying {} operand first",
        op.name(),
        v_type.name(),
        w_type.name(),
        if reflected_first { "reflected" } else { "forward" }
    );

    let try_forward = || invoke(op, v, std::slice::from_ref(w));
    let try_reflected = |r: SpecialMethod| invoke(r, w, std::slice::from_ref(v));

    if reflected_first {
        let r = reflected.expect("reflected_first implies reflected.is_some()");
        if let Ok(value) = try_reflected(r) {
            return Ok(value);
        }
        try_forward()
    } else {
        if let Ok(value) = try_forward() {
            return Ok(value);
        }
        match reflected {
            Some(r) => try_reflected(r),
            None => Err(Empty),
        }
    }
}

/// Binary arithmetic dispatch (`+`, `-`, `*`, ...). Raises `TypeError` if
/// neither the forward nor the reflected slot is implemented.
pub fn binary_op(_rt: &Runtime, op: SpecialMethod, v: &PyObjectRef, w: &PyObjectRef) -> Result<PyObjectRef, PyErr> {
    dispatch_ordered(op, v, w).map_err(|Empty| {
        PyErr::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.name(),
            v.class().name(),
            w.class().name()
        ))
    })
}

/// Rich comparison dispatch. `==`/`!=` fall back to reference identity when
/// neither side answers; `<`, `<=`, `>`, `>=` raise `TypeError` (§8).
pub fn compare(rt: &Runtime, op: SpecialMethod, v: &PyObjectRef, w: &PyObjectRef) -> Result<PyObjectRef, PyErr> {
    match dispatch_ordered(op, v, w) {
        Ok(value) => Ok(value),
        Err(Empty) => match op {
            SpecialMethod::Eq => Ok(identity_bool(rt, v.is(w))),
            SpecialMethod::Ne => Ok(identity_bool(rt, !v.is(w))),
            _ => Err(PyErr::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.name(),
                v.class().name(),
                w.class().name()
            ))),
        },
    }
}

fn identity_bool(rt: &Runtime, value: bool) -> PyObjectRef {
    PyObjectRef::new(value, rt.types().bool_.clone())
}

/// `x in y`, i.e. `y.__contains__(x)`. Raises `TypeError` naming `y`'s type
/// if it has no `__contains__` (§8 scenario 4).
pub fn contains(_rt: &Runtime, container: &PyObjectRef, item: &PyObjectRef) -> Result<bool, PyErr> {
    let result = invoke(SpecialMethod::Contains, container, std::slice::from_ref(item)).map_err(|Empty| {
        PyErr::type_error(format!("'{}' object is not a container", container.class().name()))
    })?;
    Ok(*result
        .downcast_ref::<bool>()
        .expect("a __contains__ handler must answer with a bool-payload object"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::Handle;
    use crate::spec::TypeSpec;
    use std::any::TypeId;

    struct A;
    struct B;

    #[test]
    fn comparison_is_subtype_first() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();

        let calls: Arc<parking_lot::Mutex<Vec<&'static str>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let calls_a = Arc::clone(&calls);
        let a_type = rt
            .factory()
            .from_spec(
                TypeSpec::new("A", TypeId::of::<A>()).base(object.clone()).special(
                    SpecialMethod::Lt,
                    Handle::new(move |_z, _args| {
                        calls_a.lock().push("A.__lt__");
                        Err(Empty)
                    }),
                ),
                rt.registry(),
            )
            .unwrap();

        let calls_b = Arc::clone(&calls);
        let b_type = rt
            .factory()
            .from_spec(
                TypeSpec::new("B", TypeId::of::<B>()).base(a_type.clone()).special(
                    SpecialMethod::Gt,
                    Handle::new(move |zelf, _args| {
                        calls_b.lock().push("B.__gt__");
                        Ok(zelf.clone())
                    }),
                ),
                rt.registry(),
            )
            .unwrap();

        let a = PyObjectRef::new(A, a_type);
        let b = PyObjectRef::new(B, b_type);
        compare(&rt, SpecialMethod::Lt, &a, &b).unwrap();
        assert_eq!(*calls.lock(), vec!["B.__gt__"]);
    }

    #[test]
    fn equality_falls_back_to_identity() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let t = rt
            .factory()
            .from_spec(TypeSpec::new("Plain", TypeId::of::<A>()).base(object), rt.registry())
            .unwrap();
        let a = PyObjectRef::new(A, t);
        let b = a.clone();
        let result = compare(&rt, SpecialMethod::Eq, &a, &b).unwrap();
        assert_eq!(*result.downcast_ref::<bool>().unwrap(), true);
    }

    #[test]
    fn ordering_without_lt_is_type_error() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let t = rt
            .factory()
            .from_spec(TypeSpec::new("Plain2", TypeId::of::<B>()).base(object), rt.registry())
            .unwrap();
        let a = PyObjectRef::new(B, t.clone());
        let b = PyObjectRef::new(B, t);
        assert!(compare(&rt, SpecialMethod::Lt, &a, &b).is_err());
    }

    #[test]
    fn contains_without_slot_is_type_error() {
        let rt = Runtime::new();
        let object = rt.types().object.clone();
        let t = rt
            .factory()
            .from_spec(TypeSpec::new("NoContains", TypeId::of::<A>()).base(object), rt.registry())
            .unwrap();
        let container = PyObjectRef::new(A, t.clone());
        let item = PyObjectRef::new(A, t);
        let err = contains(&rt, &container, &item).unwrap_err();
        assert!(err.message.contains("is not a container"));
    }
}
