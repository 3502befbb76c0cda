//! Float slots and kernels.

use crate::{
    BinaryOp,
    dialect::{Dialect, NumberFamily},
    dispatch::native::{CachedFloat, Native, Num, NumCtx},
    exception_private::{ExcType, RunResult},
    object::Obj,
    runtime::Runtime,
    slots::{NumberMethods, SlotResult, slot_table},
};

pub(crate) fn number_methods(dialect: &dyn Dialect) -> NumberMethods {
    let mut methods = NumberMethods::default();
    for &(op, func) in FLOAT_SLOTS {
        if dialect.supports_operator(op) {
            methods.install(&[(op, func)]);
        }
    }
    methods
}

/// Shared body of the float slots: accepts any builtin number on either side.
fn float_slot(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    let ctx = rt.num_ctx();
    let native = {
        let (Some(x), Some(y)) = (Num::of(rt.payload(a)), Num::of(rt.payload(b))) else {
            return Ok(SlotResult::NotImplemented);
        };
        float_kernel(op, x.to_f64(&ctx)?, y.to_f64(&ctx)?, &ctx)?
    };
    match native {
        Some(native) => Ok(SlotResult::Value(native.into_obj(rt, a, b)?)),
        None => Ok(SlotResult::NotImplemented),
    }
}

slot_table!(FLOAT_SLOTS, float_slot;
    Add => float_add, Sub => float_sub, Mult => float_mult, TrueDiv => float_truediv,
    FloorDiv => float_floordiv, OldDiv => float_olddiv, Mod => float_mod_slot,
    DivMod => float_divmod_slot, Pow => float_pow_slot,
);

/// Float kernel; `Ok(None)` for operators floats do not implement.
pub(crate) fn float_kernel(op: BinaryOp, a: f64, b: f64, ctx: &NumCtx) -> RunResult<Option<Native>> {
    let zero_division = || ctx.zero_division(NumberFamily::Float, op);
    let native = match op {
        BinaryOp::Add => Native::Float(a + b),
        BinaryOp::Sub => Native::Float(a - b),
        BinaryOp::Mult => Native::Float(a * b),
        BinaryOp::TrueDiv | BinaryOp::OldDiv => {
            if b == 0.0 {
                return Err(zero_division());
            }
            Native::Float(a / b)
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division());
            }
            Native::Float(float_divmod(a, b).0)
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(zero_division());
            }
            Native::Float(float_mod(a, b))
        }
        BinaryOp::DivMod => {
            if b == 0.0 {
                return Err(zero_division());
            }
            let (div, rem) = float_divmod(a, b);
            Native::Pair(Box::new((Native::Float(div), Native::Float(rem))))
        }
        BinaryOp::Pow => float_pow(a, b, ctx)?,
        _ => return Ok(None),
    };
    Ok(Some(native))
}

/// `a % b` with the sign of the divisor.
fn float_mod(a: f64, b: f64) -> f64 {
    let rem = a % b;
    if rem == 0.0 {
        0.0_f64.copysign(b)
    } else if (b < 0.0) != (rem < 0.0) {
        rem + b
    } else {
        rem
    }
}

/// Floor quotient and remainder, rounding the quotient to the nearest integer so that
/// `div * b + rem` stays as close to `a` as possible.
fn float_divmod(a: f64, b: f64) -> (f64, f64) {
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem == 0.0 {
        rem = 0.0_f64.copysign(b);
    } else if (b < 0.0) != (rem < 0.0) {
        rem += b;
        div -= 1.0;
    }
    let floordiv = if div == 0.0 {
        0.0_f64.copysign(a / b)
    } else {
        let floor = div.floor();
        if div - floor > 0.5 { floor + 1.0 } else { floor }
    };
    (floordiv, rem)
}

fn is_odd_integer(x: f64) -> bool {
    x.abs() % 2.0 == 1.0
}

/// `base ** exponent` for floats.
///
/// Special values are settled before calling into the C library, in a fixed order: a zero
/// exponent wins over a NaN base, and a NaN exponent still gives `1.0` for a base of one.
/// Results that are just one of the operands, or one of the cached constants, are returned
/// as such instead of as a fresh value.
fn float_pow(base: f64, exponent: f64, ctx: &NumCtx) -> RunResult<Native> {
    if exponent == 0.0 {
        return Ok(Native::Cached(CachedFloat::One));
    }
    if base.is_nan() {
        return Ok(Native::Left);
    }
    if exponent.is_nan() {
        return Ok(if base == 1.0 {
            Native::Cached(CachedFloat::One)
        } else {
            Native::Right
        });
    }
    if exponent.is_infinite() {
        let magnitude = base.abs();
        return Ok(if magnitude == 1.0 {
            Native::Cached(CachedFloat::One)
        } else if (exponent > 0.0) == (magnitude > 1.0) {
            Native::Float(exponent.abs())
        } else {
            Native::Cached(CachedFloat::Zero)
        });
    }
    if base.is_infinite() {
        let odd = is_odd_integer(exponent);
        return Ok(if exponent > 0.0 {
            Native::Float(if odd { base } else { base.abs() })
        } else if odd {
            Native::Float(0.0_f64.copysign(base))
        } else {
            Native::Cached(CachedFloat::Zero)
        });
    }
    if base == 0.0 {
        if exponent < 0.0 {
            return Err(ExcType::zero_division(ctx.dialect.zero_to_negative_power()));
        }
        return Ok(if is_odd_integer(exponent) {
            Native::Float(base)
        } else {
            Native::Cached(CachedFloat::Zero)
        });
    }

    let mut magnitude = base;
    let mut negate = false;
    if base < 0.0 {
        if exponent != exponent.floor() {
            return Err(ExcType::negative_fractional_power());
        }
        magnitude = -base;
        negate = is_odd_integer(exponent);
    }
    if magnitude == 1.0 {
        return Ok(Native::Cached(if negate {
            CachedFloat::MinusOne
        } else {
            CachedFloat::One
        }));
    }

    let result = magnitude.powf(exponent);
    if result.is_infinite() {
        return Err(ExcType::float_result_out_of_range());
    }
    Ok(Native::Float(if negate { -result } else { result }))
}

/// `repr()` of a float.
///
/// ryu finds the shortest digits that round-trip; they are laid out positionally for decimal
/// exponents in `-4..16` and in scientific notation with a signed, at least two-digit
/// exponent otherwise (`1e+16`, `1e-07`).
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let (sign, digits, point) = shortest_digits(buffer.format_finite(value));
    let mut out = sign.to_owned();
    if digits.is_empty() {
        out.push_str("0.0");
    } else if (-4..16).contains(&(point - 1)) {
        push_positional(&mut out, &digits, point);
    } else {
        push_scientific(&mut out, &digits, point - 1);
    }
    out
}

/// Splits ryu output into its sign, the significant digits without leading or trailing
/// zeros, and the position of the decimal point relative to those digits.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "ryu output is at most 24 characters"
)]
fn shortest_digits(formatted: &str) -> (&str, String, i32) {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (mantissa, exponent) = match unsigned.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse::<i32>().expect("ryu writes a decimal exponent")),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all = format!("{int_part}{frac_part}");
    let significant = all.trim_start_matches('0');
    let leading_zeros = all.len() - significant.len();
    let point = int_part.len() as i32 - leading_zeros as i32 + exponent;
    (sign, significant.trim_end_matches('0').to_owned(), point)
}

fn push_positional(out: &mut String, digits: &str, point: i32) {
    match usize::try_from(point) {
        Ok(0) | Err(_) => {
            out.push_str("0.");
            for _ in point..0 {
                out.push('0');
            }
            out.push_str(digits);
        }
        Ok(point) if point >= digits.len() => {
            out.push_str(digits);
            out.extend(std::iter::repeat_n('0', point - digits.len()));
            out.push_str(".0");
        }
        Ok(point) => {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
}

fn push_scientific(out: &mut String, digits: &str, exponent: i32) {
    let (first, rest) = digits.split_at(1);
    out.push_str(first);
    if !rest.is_empty() {
        out.push('.');
        out.push_str(rest);
    }
    out.push('e');
    out.push(if exponent < 0 { '-' } else { '+' });
    let magnitude = exponent.unsigned_abs();
    if magnitude < 10 {
        out.push('0');
    }
    out.push_str(&magnitude.to_string());
}
