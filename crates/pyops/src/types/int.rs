//! Integer slots and kernels.
//!
//! Integers live in one of two payload representations: `i64` when the value fits and
//! [`LongInt`](super::LongInt) otherwise. The kernels below compute on unboxed values and
//! promote to arbitrary precision whenever a fixed-width operation would overflow.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use super::{LongInt, float::float_kernel};
use crate::{
    BinaryOp,
    dialect::{Dialect, NumberFamily},
    dispatch::native::{Native, Num, NumCtx, integer_kernel},
    exception_private::{ExcType, RunResult},
    object::Obj,
    runtime::Runtime,
    slots::{NumberMethods, SlotResult, slot_table},
    types::long_int::{TrueDivError, big_to_f64, true_divide},
};

/// Which integer type a slot table implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntFlavor {
    /// Legacy `int`: only accepts fixed-width operands, leaving `long` to the other side.
    Fixed,
    /// Unified `int`: any integer representation.
    Unified,
    /// Legacy `long`: any integer, always computed with arbitrary precision.
    Long,
}

impl IntFlavor {
    /// The flavor of the builtin `int` type in `dialect`.
    pub fn for_int_type(dialect: &dyn Dialect) -> Self {
        if dialect.has_distinct_long() {
            Self::Fixed
        } else {
            Self::Unified
        }
    }

    fn accepts(self, operand: Num<'_>) -> bool {
        match operand {
            Num::Bool(_) | Num::Int(_) => true,
            Num::Long(_) => self != Self::Fixed,
            Num::Float(_) => false,
        }
    }
}

/// The numeric table for an integer type, restricted to the operators of `dialect`.
pub(crate) fn number_methods(dialect: &dyn Dialect, flavor: IntFlavor) -> NumberMethods {
    let table = match flavor {
        IntFlavor::Fixed => FIXED_SLOTS,
        IntFlavor::Unified => UNIFIED_SLOTS,
        IntFlavor::Long => LONG_SLOTS,
    };
    let mut methods = NumberMethods::default();
    for &(op, func) in table {
        if dialect.supports_operator(op) {
            methods.install(&[(op, func)]);
        }
    }
    methods
}

/// Shared body of every integer slot.
///
/// Both operands must be integers the flavor accepts, otherwise the slot declines so the
/// other operand's slot (or coercion) gets its turn.
pub(crate) fn int_slot(rt: &mut Runtime, flavor: IntFlavor, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    let ctx = rt.num_ctx();
    let native = {
        let (Some(x), Some(y)) = (Num::of(rt.payload(a)), Num::of(rt.payload(b))) else {
            return Ok(SlotResult::NotImplemented);
        };
        if !flavor.accepts(x) || !flavor.accepts(y) {
            return Ok(SlotResult::NotImplemented);
        }
        if flavor == IntFlavor::Long {
            long_kernel(op, &x.to_big(), &y.to_big(), &ctx)?
        } else {
            integer_kernel(op, x, y, &ctx)?
        }
    };
    match native {
        Some(native) => Ok(SlotResult::Value(native.into_obj(rt, a, b)?)),
        None => Ok(SlotResult::NotImplemented),
    }
}

fn fixed_slot(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    int_slot(rt, IntFlavor::Fixed, op, a, b)
}

fn unified_slot(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    int_slot(rt, IntFlavor::Unified, op, a, b)
}

fn long_slot(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    int_slot(rt, IntFlavor::Long, op, a, b)
}

slot_table!(FIXED_SLOTS, fixed_slot;
    Add => fixed_add, Sub => fixed_sub, Mult => fixed_mult, TrueDiv => fixed_truediv,
    FloorDiv => fixed_floordiv, OldDiv => fixed_olddiv, Mod => fixed_mod, DivMod => fixed_divmod,
    Pow => fixed_pow, LShift => fixed_lshift, RShift => fixed_rshift, BitAnd => fixed_and,
    BitOr => fixed_or, BitXor => fixed_xor,
);

slot_table!(UNIFIED_SLOTS, unified_slot;
    Add => unified_add, Sub => unified_sub, Mult => unified_mult, TrueDiv => unified_truediv,
    FloorDiv => unified_floordiv, OldDiv => unified_olddiv, Mod => unified_mod,
    DivMod => unified_divmod, Pow => unified_pow, LShift => unified_lshift,
    RShift => unified_rshift, BitAnd => unified_and, BitOr => unified_or, BitXor => unified_xor,
);

slot_table!(LONG_SLOTS, long_slot;
    Add => long_add_slot, Sub => long_sub_slot, Mult => long_mult_slot,
    TrueDiv => long_truediv_slot, FloorDiv => long_floordiv_slot, OldDiv => long_olddiv_slot,
    Mod => long_mod_slot, DivMod => long_divmod_slot, Pow => long_pow_slot,
    LShift => long_lshift_slot, RShift => long_rshift_slot, BitAnd => long_and_slot,
    BitOr => long_or_slot, BitXor => long_xor_slot,
);

/// Fixed-width integer kernel. Results that overflow `i64` are promoted.
///
/// Returns `Ok(None)` for operators integers do not implement.
pub(crate) fn int_kernel(op: BinaryOp, a: i64, b: i64, ctx: &NumCtx) -> RunResult<Option<Native>> {
    let family = NumberFamily::Int;
    let native = match op {
        BinaryOp::Add => a.checked_add(b).map_or_else(|| Native::Big(BigInt::from(a) + b), Native::Int),
        BinaryOp::Sub => a.checked_sub(b).map_or_else(|| Native::Big(BigInt::from(a) - b), Native::Int),
        BinaryOp::Mult => a.checked_mul(b).map_or_else(|| Native::Big(BigInt::from(a) * b), Native::Int),
        BinaryOp::FloorDiv | BinaryOp::OldDiv => {
            if b == 0 {
                return Err(ctx.zero_division(family, op));
            }
            floor_div(a, b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ctx.zero_division(family, op));
            }
            Native::Int(floor_mod(a, b))
        }
        BinaryOp::DivMod => {
            if b == 0 {
                return Err(ctx.zero_division(family, op));
            }
            Native::Pair(Box::new((floor_div(a, b), Native::Int(floor_mod(a, b)))))
        }
        BinaryOp::TrueDiv => {
            if b == 0 {
                return Err(ctx.zero_division(family, op));
            }
            Native::Float(int_true_divide(a, b, ctx)?)
        }
        BinaryOp::Pow => {
            if b < 0 {
                return float_kernel(op, a as f64, b as f64, ctx);
            }
            int_pow(a, b, ctx)?
        }
        BinaryOp::LShift => {
            if b < 0 {
                return Err(ExcType::negative_shift_count());
            }
            int_lshift(a, b, ctx)?
        }
        BinaryOp::RShift => {
            if b < 0 {
                return Err(ExcType::negative_shift_count());
            }
            Native::Int(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b })
        }
        BinaryOp::BitAnd => Native::Int(a & b),
        BinaryOp::BitOr => Native::Int(a | b),
        BinaryOp::BitXor => Native::Int(a ^ b),
        BinaryOp::MatMult => return Ok(None),
    };
    Ok(Some(native))
}

fn floor_div(a: i64, b: i64) -> Native {
    // i64::MIN // -1 is the one quotient that does not fit
    if a == i64::MIN && b == -1 {
        Native::Big(-BigInt::from(a))
    } else {
        Native::Int(a.div_floor(&b))
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    if b == -1 { 0 } else { a.mod_floor(&b) }
}

/// Largest magnitude an `i64` can have while still converting to a float exactly.
const EXACT_FLOAT_INT: i64 = 1 << 53;

fn int_true_divide(a: i64, b: i64, ctx: &NumCtx) -> RunResult<f64> {
    if (-EXACT_FLOAT_INT..=EXACT_FLOAT_INT).contains(&a) && (-EXACT_FLOAT_INT..=EXACT_FLOAT_INT).contains(&b) {
        return Ok(a as f64 / b as f64);
    }
    true_divide(&BigInt::from(a), &BigInt::from(b)).map_err(|err| match err {
        TrueDivError::ZeroDivision => ctx.zero_division(NumberFamily::Int, BinaryOp::TrueDiv),
        TrueDivError::Overflow => ExcType::integer_division_too_large(),
    })
}

fn int_pow(base: i64, exponent: i64, ctx: &NumCtx) -> RunResult<Native> {
    let Ok(exp) = u32::try_from(exponent) else {
        return small_base_pow(base, exponent);
    };
    if let Some(value) = base.checked_pow(exp) {
        return Ok(Native::Int(value));
    }
    let bits = u64::from(i64::BITS - base.unsigned_abs().leading_zeros());
    ctx.check_large_result(LongInt::estimate_pow_bytes(bits, u64::from(exp)))?;
    Ok(Native::Big(BigInt::from(base).pow(exp)))
}

/// Powers whose exponent does not fit `u32`: only `0`, `1` and `-1` stay representable.
fn small_base_pow(base: i64, exponent: i64) -> RunResult<Native> {
    match base {
        0 | 1 => Ok(Native::Int(base)),
        -1 => Ok(Native::Int(if exponent % 2 == 0 { 1 } else { -1 })),
        _ => Err(ExcType::exponent_too_large()),
    }
}

fn int_lshift(a: i64, shift: i64, ctx: &NumCtx) -> RunResult<Native> {
    if a == 0 {
        return Ok(Native::Int(0));
    }
    if shift < 64 {
        let wide = i128::from(a) << shift;
        return Ok(i64::try_from(wide).map_or_else(|_| Native::Big(BigInt::from(wide)), Native::Int));
    }
    let bits = u64::from(i64::BITS - a.unsigned_abs().leading_zeros());
    ctx.check_large_result(LongInt::estimate_lshift_bytes(bits, shift.unsigned_abs()))?;
    let shift = usize::try_from(shift).map_err(|_| ExcType::overflow_shift_count())?;
    Ok(Native::Big(BigInt::from(a) << shift))
}

/// Arbitrary-precision integer kernel.
///
/// Results are always [`Native::Big`] so the legacy `long` type keeps its representation;
/// the unified `int` type demotes small values when boxing.
pub(crate) fn long_kernel(op: BinaryOp, a: &BigInt, b: &BigInt, ctx: &NumCtx) -> RunResult<Option<Native>> {
    let family = ctx.big_family();
    let native = match op {
        BinaryOp::Add => Native::Big(a + b),
        BinaryOp::Sub => Native::Big(a - b),
        BinaryOp::Mult => {
            ctx.check_large_result(LongInt::estimate_mult_bytes(a.bits(), b.bits()))?;
            Native::Big(a * b)
        }
        BinaryOp::FloorDiv | BinaryOp::OldDiv => {
            if b.is_zero() {
                return Err(ctx.zero_division(family, op));
            }
            Native::Big(a.div_floor(b))
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(ctx.zero_division(family, op));
            }
            Native::Big(a.mod_floor(b))
        }
        BinaryOp::DivMod => {
            if b.is_zero() {
                return Err(ctx.zero_division(family, op));
            }
            let (quotient, remainder) = a.div_mod_floor(b);
            Native::Pair(Box::new((Native::Big(quotient), Native::Big(remainder))))
        }
        BinaryOp::TrueDiv => match true_divide(a, b) {
            Ok(value) => Native::Float(value),
            Err(TrueDivError::ZeroDivision) => return Err(ctx.zero_division(family, op)),
            Err(TrueDivError::Overflow) => return Err(ExcType::integer_division_too_large()),
        },
        BinaryOp::Pow => {
            if b.is_negative() {
                let x = to_float(a, ctx)?;
                let y = to_float(b, ctx)?;
                return float_kernel(op, x, y, ctx);
            }
            long_pow(a, b, ctx)?
        }
        BinaryOp::LShift => {
            if b.is_negative() {
                return Err(ExcType::negative_shift_count());
            }
            if a.is_zero() {
                Native::Big(BigInt::zero())
            } else {
                let shift = b.to_u64().ok_or_else(ExcType::overflow_shift_count)?;
                ctx.check_large_result(LongInt::estimate_lshift_bytes(a.bits(), shift))?;
                let shift = usize::try_from(shift).map_err(|_| ExcType::overflow_shift_count())?;
                Native::Big(a << shift)
            }
        }
        BinaryOp::RShift => {
            if b.is_negative() {
                return Err(ExcType::negative_shift_count());
            }
            match b.to_usize() {
                Some(shift) => Native::Big(a >> shift),
                None => Native::Big(BigInt::from(if a.is_negative() { -1 } else { 0 })),
            }
        }
        BinaryOp::BitAnd => Native::Big(a & b),
        BinaryOp::BitOr => Native::Big(a | b),
        BinaryOp::BitXor => Native::Big(a ^ b),
        BinaryOp::MatMult => return Ok(None),
    };
    Ok(Some(native))
}

fn to_float(value: &BigInt, ctx: &NumCtx) -> RunResult<f64> {
    big_to_f64(value).ok_or_else(|| ExcType::overflow_error(ctx.dialect.int_too_large_for_float()))
}

fn long_pow(base: &BigInt, exponent: &BigInt, ctx: &NumCtx) -> RunResult<Native> {
    if let Some(small) = base.to_i64()
        && matches!(small, -1..=1)
    {
        let odd = exponent.is_odd();
        let value = match small {
            -1 if !odd => 1,
            _ if exponent.is_zero() => 1,
            other => other,
        };
        return Ok(Native::Big(BigInt::from(value)));
    }
    let exp = exponent.to_u32().ok_or_else(ExcType::exponent_too_large)?;
    ctx.check_large_result(LongInt::estimate_pow_bytes(base.bits(), u64::from(exp)))?;
    Ok(Native::Big(base.pow(exp)))
}
