use super::{Dialect, DialectKind, NumberFamily};
use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError, RunResult},
    heap::defer_drop,
    object::Obj,
    runtime::Runtime,
    slots::{Coercion, SlotResult},
};

/// The 2.7 language family.
///
/// `int` and `long` are distinct types, `/` between integers is classic (floor) division, `@`
/// does not exist, and legacy-style numeric types take part in two-sided coercion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Legacy;

impl Dialect for Legacy {
    fn kind(&self) -> DialectKind {
        DialectKind::Legacy
    }

    fn supports_operator(&self, op: BinaryOp) -> bool {
        op != BinaryOp::MatMult
    }

    fn supports_coercion(&self) -> bool {
        true
    }

    fn has_distinct_long(&self) -> bool {
        true
    }

    fn coerce_fallback(&self, rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Obj>> {
        let t1 = rt.type_of(a);
        let t2 = rt.type_of(b);
        if rt.types.get(t1).is_new_style_number() && rt.types.get(t2).is_new_style_number() {
            return Ok(None);
        }

        let Some((x, y)) = coerce_pair(rt, op, a, b)? else {
            return Ok(None);
        };
        call_coerced(rt, op, x, y)
    }

    fn zero_division(&self, family: NumberFamily, op: BinaryOp) -> &'static str {
        match (family, op) {
            (NumberFamily::Int, BinaryOp::TrueDiv) | (NumberFamily::Long, BinaryOp::TrueDiv) => "division by zero",
            (NumberFamily::Int, _) => "integer division or modulo by zero",
            (NumberFamily::Long, _) => "long division or modulo by zero",
            (NumberFamily::Float, BinaryOp::TrueDiv | BinaryOp::OldDiv) => "float division by zero",
            (NumberFamily::Float, BinaryOp::Mod) => "float modulo",
            (NumberFamily::Float, _) => "float divmod()",
        }
    }

    fn zero_to_negative_power(&self) -> &'static str {
        "0.0 cannot be raised to a negative power"
    }

    fn int_too_large_for_float(&self) -> &'static str {
        "long int too large to convert to float"
    }

    fn str_concat_error(&self, other_type: &str) -> RunError {
        ExcType::type_error(format!("cannot concatenate 'str' and '{other_type}' objects"))
    }

    fn chains_exceptions(&self) -> bool {
        false
    }

    fn reraise_without_active(&self) -> RunError {
        ExcType::type_error("exceptions must be old-style classes or derived from BaseException, not NoneType")
    }
}

/// Runs the two-sided coercion: identical types coerce trivially, otherwise the left
/// operand's coercion slot is tried and then the right operand's with the arguments swapped.
///
/// On success both returned references are owned by the caller.
fn coerce_pair(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<(Obj, Obj)>> {
    let t1 = rt.type_of(a);
    let t2 = rt.type_of(b);
    if t1 == t2 {
        return Ok(Some((rt.new_ref(a), rt.new_ref(b))));
    }
    if let Some(coerce) = rt.types.coerce_slot(t1) {
        let coercion = coerce(rt, a, b)?;
        rt.trace_coercion(op, t1, matches!(coercion, Coercion::Coerced(..)));
        if let Coercion::Coerced(x, y) = coercion {
            return Ok(Some((x, y)));
        }
    }
    if let Some(coerce) = rt.types.coerce_slot(t2) {
        let coercion = coerce(rt, b, a)?;
        rt.trace_coercion(op, t2, matches!(coercion, Coercion::Coerced(..)));
        if let Coercion::Coerced(y, x) = coercion {
            return Ok(Some((x, y)));
        }
    }
    Ok(None)
}

/// Calls the regular slot of the coerced left operand, releasing both coerced values.
///
/// Once coercion succeeded its result is final: a slot answering `NotImplemented` here
/// ends in the type error rather than further attempts.
fn call_coerced(rt: &mut Runtime, op: BinaryOp, x: Obj, y: Obj) -> RunResult<Option<Obj>> {
    let pair = (x, y);
    defer_drop!(pair, rt);
    let (x, y) = pair;
    let tx = rt.type_of(x);
    let Some(slot) = rt.types.coerced_slot(tx, op) else {
        return Ok(None);
    };
    match slot(rt, x, y)? {
        SlotResult::Value(result) => Ok(Some(result)),
        SlotResult::NotImplemented => Ok(None),
    }
}
