//! Specialized entry points, one per operator and statically known operand types.
//!
//! The compiler emits `binary_<op>_<left>_<right>` when it knows the operand types of an
//! expression, `binary_<op>_nbool_<left>_<right>` when only the truth value is used, and
//! `inplace_<op>_<left>_<right>` for augmented assignment. `object` stands for an operand
//! whose type is unknown. Pairs of `int`, `long` and `float` go straight to the numeric kernels; every other pair,
//! and every in-place form, takes the generic path. Debug builds check the promised types;
//! release builds trust them, and a broken promise only costs the fast path, never
//! correctness.
//!
//! ```
//! use pyops::{DialectKind, Runtime, entry};
//!
//! let mut rt = Runtime::builtin(DialectKind::Current);
//! let a = rt.new_int(i64::MAX).unwrap();
//! let b = rt.new_int(1).unwrap();
//! let sum = entry::binary_add_int_int(&mut rt, &a, &b).unwrap();
//! assert_eq!(rt.repr(&sum), "9223372036854775808");
//! for obj in [a, b, sum] {
//!     rt.release(obj);
//! }
//! ```

use crate::{
    BinaryOp,
    dispatch::{OperationForm, native::Native},
    exception_private::RunResult,
    heap::HeapData,
    object::Obj,
    runtime::Runtime,
    types::{
        TypeId,
        float::float_kernel,
        int::{int_kernel, long_kernel},
    },
};

/// The operand type an entry point was specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Object,
    /// Exactly `int`.
    Int,
    /// The arbitrary-precision integer type: `long` in the legacy dialect, `int` otherwise.
    Long,
    Float,
    Bool,
    Str,
    List,
    Tuple,
    /// `set` or `frozenset`.
    Set,
}

impl OperandKind {
    /// Whether `obj` has exactly this type.
    #[must_use]
    pub fn admits(self, rt: &Runtime, obj: &Obj) -> bool {
        let tp = rt.type_of(obj);
        match self {
            Self::Object => true,
            Self::Int => tp == TypeId::INT,
            Self::Long => tp == rt.types().big_int_type(),
            Self::Float => tp == TypeId::FLOAT,
            Self::Bool => tp == TypeId::BOOL,
            Self::Str => tp == TypeId::STR,
            Self::List => tp == TypeId::LIST,
            Self::Tuple => tp == TypeId::TUPLE,
            Self::Set => matches!(tp, TypeId::SET | TypeId::FROZENSET),
        }
    }
}

#[inline]
fn debug_check(rt: &Runtime, left: OperandKind, a: &Obj, right: OperandKind, b: &Obj) {
    debug_assert!(
        left.admits(rt, a),
        "left operand of type '{}' passed as {left:?}",
        rt.type_name(a)
    );
    debug_assert!(
        right.admits(rt, b),
        "right operand of type '{}' passed as {right:?}",
        rt.type_name(b)
    );
}

/// The kernel result for a numeric pair the entry point was specialized for. `None` when the
/// kernel does not cover the operator, or the payloads are not the promised ones.
#[inline]
fn native_pair(
    rt: &Runtime,
    op: BinaryOp,
    left: OperandKind,
    a: &Obj,
    right: OperandKind,
    b: &Obj,
) -> RunResult<Option<Native>> {
    use OperandKind::{Float, Int, Long};

    if !matches!(left, Int | Long | Float) || !matches!(right, Int | Long | Float) {
        return Ok(None);
    }
    let ctx = rt.num_ctx();
    match ((left, rt.heap.get(a.id())), (right, rt.heap.get(b.id()))) {
        ((Int, HeapData::Int(x)), (Int, HeapData::Int(y))) => int_kernel(op, *x, *y, &ctx),
        ((Long, HeapData::Long(x)), (Long, HeapData::Long(y))) => long_kernel(op, x.inner(), y.inner(), &ctx),
        ((Float, HeapData::Float(x)), (Float, HeapData::Float(y))) => float_kernel(op, *x, *y, &ctx),
        ((Float, HeapData::Float(x)), (Int, HeapData::Int(y))) => float_kernel(op, *x, *y as f64, &ctx),
        ((Int, HeapData::Int(x)), (Float, HeapData::Float(y))) => float_kernel(op, *x as f64, *y, &ctx),
        _ => Ok(None),
    }
}

fn specialized_binary(
    rt: &mut Runtime,
    op: BinaryOp,
    left: OperandKind,
    a: &Obj,
    right: OperandKind,
    b: &Obj,
) -> RunResult<Obj> {
    debug_check(rt, left, a, right, b);
    rt.check_operator(op)?;
    rt.trace_dispatch(op, OperationForm::Binary, rt.type_of(a), rt.type_of(b));
    match native_pair(rt, op, left, a, right, b)? {
        Some(native) => {
            rt.trace_fast_path(op, OperationForm::Binary);
            native.into_obj(rt, a, b)
        }
        None => rt.dispatch_binary(op, a, b),
    }
}

fn specialized_bool(
    rt: &mut Runtime,
    op: BinaryOp,
    left: OperandKind,
    a: &Obj,
    right: OperandKind,
    b: &Obj,
) -> RunResult<bool> {
    debug_check(rt, left, a, right, b);
    rt.check_operator(op)?;
    rt.trace_dispatch(op, OperationForm::Bool, rt.type_of(a), rt.type_of(b));
    match native_pair(rt, op, left, a, right, b)? {
        Some(native) => {
            rt.trace_fast_path(op, OperationForm::Bool);
            native.truth(rt, a, b)
        }
        None => rt.dispatch_binary_bool(op, a, b),
    }
}

/// Generates the entry points for every operator over every listed operand pair.
///
/// The pair list is passed through as one token tree so it can be repeated per operator.
macro_rules! entry_points {
    (
        inplace: [$($name:ident => $op:ident),* $(,)?],
        binary_only: [$($bname:ident => $bop:ident),* $(,)?],
        pairs: $pairs:tt $(,)?
    ) => {
        $(
            entry_points!(@binary $name, $op, $pairs);
            entry_points!(@inplace $name, $op, $pairs);
        )*
        $(
            entry_points!(@binary $bname, $bop, $pairs);
        )*
    };
    (@binary $name:ident, $op:ident, [$(($l:ident: $lk:ident, $r:ident: $rk:ident)),* $(,)?]) => {
        paste::paste! {
            $(
                #[doc = concat!("`", stringify!($l), " ", stringify!($op), " ", stringify!($r), "`")]
                pub fn [<binary_ $name _ $l _ $r>](rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
                    specialized_binary(rt, BinaryOp::$op, OperandKind::$lk, a, OperandKind::$rk, b)
                }

                #[doc = concat!("Truth of `", stringify!($l), " ", stringify!($op), " ", stringify!($r), "`")]
                pub fn [<binary_ $name _nbool_ $l _ $r>](rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<bool> {
                    specialized_bool(rt, BinaryOp::$op, OperandKind::$lk, a, OperandKind::$rk, b)
                }
            )*
        }
    };
    (@inplace $name:ident, $op:ident, [$(($l:ident: $lk:ident, $r:ident: $rk:ident)),* $(,)?]) => {
        paste::paste! {
            $(
                #[doc = concat!("In-place `", stringify!($l), " ", stringify!($op), " ", stringify!($r), "`")]
                pub fn [<inplace_ $name _ $l _ $r>](rt: &mut Runtime, target: &mut Obj, value: &Obj) -> RunResult<()> {
                    debug_check(rt, OperandKind::$lk, target, OperandKind::$rk, value);
                    rt.inplace_operation(BinaryOp::$op, target, value)
                }
            )*
        }
    };
}

entry_points! {
    inplace: [
        add => Add,
        sub => Sub,
        mult => Mult,
        matmult => MatMult,
        truediv => TrueDiv,
        floordiv => FloorDiv,
        div => OldDiv,
        mod => Mod,
        pow => Pow,
        lshift => LShift,
        rshift => RShift,
        and => BitAnd,
        or => BitOr,
        xor => BitXor,
    ],
    binary_only: [divmod => DivMod],
    pairs: [
        (object: Object, object: Object),
        (int: Int, int: Int),
        (int: Int, object: Object),
        (object: Object, int: Int),
        (long: Long, long: Long),
        (float: Float, float: Float),
        (float: Float, int: Int),
        (int: Int, float: Float),
        (float: Float, object: Object),
        (object: Object, float: Float),
        (bool: Bool, bool: Bool),
        (str: Str, str: Str),
        (list: List, list: List),
        (tuple: Tuple, tuple: Tuple),
        (set: Set, set: Set),
    ],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DialectKind;

    #[test]
    fn kinds_check_exact_types() {
        let mut rt = Runtime::builtin(DialectKind::Legacy);
        let small = rt.new_int(1).unwrap();
        let big = rt.new_int_from_big(num_bigint::BigInt::from(1)).unwrap();
        assert!(OperandKind::Int.admits(&rt, &small));
        assert!(!OperandKind::Long.admits(&rt, &small));
        assert!(OperandKind::Long.admits(&rt, &big));
        assert!(OperandKind::Object.admits(&rt, &big));
        rt.release(small);
        rt.release(big);
    }

    #[test]
    fn nbool_projection() {
        let mut rt = Runtime::builtin(DialectKind::Current);
        let a = rt.new_int(3).unwrap();
        let b = rt.new_int(3).unwrap();
        assert!(!binary_sub_nbool_int_int(&mut rt, &a, &b).unwrap());
        assert!(binary_xor_nbool_object_object(&mut rt, &a, &a).is_ok_and(|t| !t));
        rt.release(a);
        rt.release(b);
    }
}
