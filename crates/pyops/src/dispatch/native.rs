//! Native results of the specialized fast paths.
//!
//! Numeric kernels are pure functions over unboxed operands. They return a [`Native`]
//! describing the result without allocating it, so the caller decides how to project it:
//! boxed into a new object, or reduced straight to a truth value.

use std::borrow::Cow;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::{
    BinaryOp,
    dialect::{Dialect, NumberFamily},
    exception_private::{ExcType, RunError, RunResult},
    heap::HeapData,
    object::Obj,
    resource::{ResourceError, ResourceLimits},
    runtime::Runtime,
    types::{
        float::float_kernel,
        int::{int_kernel, long_kernel},
        long_int::big_to_f64,
        sequence, set,
    },
};

/// The float objects the runtime keeps preallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CachedFloat {
    Zero,
    One,
    MinusOne,
}

/// An operator result that has not been boxed yet.
#[derive(Debug)]
pub(crate) enum Native {
    Int(i64),
    Big(BigInt),
    Float(f64),
    Bool(bool),
    Cached(CachedFloat),
    /// The left operand object itself.
    Left,
    /// The right operand object itself.
    Right,
    /// A `divmod()` result.
    Pair(Box<(Native, Native)>),
    /// Already boxed, e.g. by a container kernel.
    Object(Obj),
}

impl Native {
    /// Boxes the result into a new reference.
    pub fn into_obj(self, rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
        match self {
            Self::Int(value) => rt.new_int(value),
            Self::Big(value) => rt.new_int_from_big(value),
            Self::Float(value) => rt.new_float(value),
            Self::Bool(value) => Ok(rt.bool_obj(value)),
            Self::Cached(which) => Ok(rt.cached_float(which)),
            Self::Left => operand_float(rt, a),
            Self::Right => operand_float(rt, b),
            Self::Pair(pair) => {
                let (first, second) = *pair;
                let first = first.into_obj(rt, a, b)?;
                match second.into_obj(rt, a, b) {
                    Ok(second) => rt.new_tuple(vec![first, second]),
                    Err(err) => {
                        rt.release(first);
                        Err(err)
                    }
                }
            }
            Self::Object(obj) => Ok(obj),
        }
    }

    /// Truth value of the result, without allocating it where possible.
    pub fn truth(self, rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<bool> {
        match self {
            Self::Int(value) => Ok(value != 0),
            Self::Big(value) => Ok(!value.is_zero()),
            Self::Float(value) => Ok(value != 0.0),
            Self::Bool(value) => Ok(value),
            Self::Cached(which) => Ok(which != CachedFloat::Zero),
            Self::Left => rt.is_true(a),
            Self::Right => rt.is_true(b),
            Self::Pair(_) => Ok(true),
            Self::Object(obj) => {
                let truth = rt.is_true(&obj);
                rt.release(obj);
                truth
            }
        }
    }
}

/// A float operand returned as the result: exact floats are shared, instances of float
/// subclasses are unwrapped into a plain float.
fn operand_float(rt: &mut Runtime, operand: &Obj) -> RunResult<Obj> {
    match rt.heap.get(operand.id()) {
        HeapData::Float(_) => Ok(rt.new_ref(operand)),
        _ => match rt.float_value(operand) {
            Some(value) => rt.new_float(value),
            None => Err(RunError::internal("float result taken from a non-float operand")),
        },
    }
}

/// What the numeric kernels need to know about the runtime.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NumCtx {
    pub dialect: &'static dyn Dialect,
    limits: ResourceLimits,
    memory_used: usize,
}

impl NumCtx {
    pub fn new(dialect: &'static dyn Dialect, limits: ResourceLimits, memory_used: usize) -> Self {
        Self {
            dialect,
            limits,
            memory_used,
        }
    }

    /// Rejects a result whose estimated size exceeds the memory limit; `None` stands for an
    /// estimate too large to represent.
    pub fn check_large_result(&self, estimated_bytes: Option<usize>) -> RunResult<()> {
        match estimated_bytes {
            Some(bytes) => Ok(self.limits.check_large_result(self.memory_used, bytes)?),
            None => Err(ResourceError::Memory {
                limit: self.limits.max_memory.unwrap_or(usize::MAX),
                used: usize::MAX,
            }
            .into()),
        }
    }

    /// The family big integers report division errors as.
    pub fn big_family(&self) -> NumberFamily {
        if self.dialect.has_distinct_long() {
            NumberFamily::Long
        } else {
            NumberFamily::Int
        }
    }

    pub fn zero_division(&self, family: NumberFamily, op: BinaryOp) -> RunError {
        ExcType::zero_division(self.dialect.zero_division(family, op))
    }
}

/// An unboxed numeric operand.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num<'a> {
    Bool(bool),
    Int(i64),
    Long(&'a BigInt),
    Float(f64),
}

impl<'a> Num<'a> {
    pub fn of(data: &'a HeapData) -> Option<Self> {
        match data {
            HeapData::Bool(b) => Some(Self::Bool(*b)),
            HeapData::Int(i) => Some(Self::Int(*i)),
            HeapData::Long(li) => Some(Self::Long(li.inner())),
            HeapData::Float(f) => Some(Self::Float(*f)),
            _ => None,
        }
    }

    /// The value as a fixed-width integer, for `bool` and small `int` operands.
    pub fn small_int(self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(b)),
            Self::Int(i) => Some(i),
            Self::Long(_) | Self::Float(_) => None,
        }
    }

    /// # Panics
    /// Panics when called on a float operand.
    pub fn to_big(self) -> Cow<'a, BigInt> {
        match self {
            Self::Bool(b) => Cow::Owned(BigInt::from(u8::from(b))),
            Self::Int(i) => Cow::Owned(BigInt::from(i)),
            Self::Long(big) => Cow::Borrowed(big),
            Self::Float(_) => unreachable!("float operand converted to an integer"),
        }
    }

    pub fn to_f64(self, ctx: &NumCtx) -> RunResult<f64> {
        match self {
            Self::Bool(b) => Ok(f64::from(u8::from(b))),
            Self::Int(i) => Ok(i as f64),
            Self::Long(big) => {
                big_to_f64(big).ok_or_else(|| ExcType::overflow_error(ctx.dialect.int_too_large_for_float()))
            }
            Self::Float(f) => Ok(f),
        }
    }
}

/// Integer arithmetic on two integer operands: fixed-width when both fit, arbitrary
/// precision otherwise.
pub(crate) fn integer_kernel(op: BinaryOp, x: Num<'_>, y: Num<'_>, ctx: &NumCtx) -> RunResult<Option<Native>> {
    match (x.small_int(), y.small_int()) {
        (Some(a), Some(b)) => int_kernel(op, a, b, ctx),
        _ => long_kernel(op, &x.to_big(), &y.to_big(), ctx),
    }
}

/// The full numeric fast path: the result every builtin numeric slot combination would
/// produce for these operands.
pub(crate) fn numeric_kernel(op: BinaryOp, x: Num<'_>, y: Num<'_>, ctx: &NumCtx) -> RunResult<Option<Native>> {
    match (x, y) {
        (Num::Bool(p), Num::Bool(q)) if matches!(op, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor) => {
            Ok(Some(Native::Bool(bool_logic(op, p, q))))
        }
        (Num::Float(_), _) | (_, Num::Float(_)) => float_kernel(op, x.to_f64(ctx)?, y.to_f64(ctx)?, ctx),
        _ => integer_kernel(op, x, y, ctx),
    }
}

pub(crate) fn bool_logic(op: BinaryOp, p: bool, q: bool) -> bool {
    match op {
        BinaryOp::BitAnd => p & q,
        BinaryOp::BitOr => p | q,
        _ => p ^ q,
    }
}

impl Runtime {
    pub(crate) fn num_ctx(&self) -> NumCtx {
        NumCtx::new(self.dialect, *self.heap.limits(), self.heap.memory_used())
    }

    /// Fast path for exact builtin numbers: `None` when either operand is not one.
    pub(crate) fn native_numeric(&self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Native>> {
        let ctx = self.num_ctx();
        let (Some(x), Some(y)) = (Num::of(self.heap.get(a.id())), Num::of(self.heap.get(b.id()))) else {
            return Ok(None);
        };
        numeric_kernel(op, x, y, &ctx)
    }

    /// Fast path for exact builtin containers: concatenation and repetition of `str`, `list`
    /// and `tuple`, and the set algebra of `set` and `frozenset`.
    pub(crate) fn native_container(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Native>> {
        let kinds = (ContainerKind::of(self.heap.get(a.id())), ContainerKind::of(self.heap.get(b.id())));
        let result = match (op, kinds) {
            (BinaryOp::Add, (Some(ContainerKind::Str), Some(ContainerKind::Str))) => sequence::str_concat(self, a, b)?,
            (BinaryOp::Add, (Some(ContainerKind::List), Some(ContainerKind::List))) => {
                sequence::list_concat(self, a, b)?
            }
            (BinaryOp::Add, (Some(ContainerKind::Tuple), Some(ContainerKind::Tuple))) => {
                sequence::tuple_concat(self, a, b)?
            }
            (BinaryOp::Mult, (Some(seq), Some(ContainerKind::Index))) if seq.is_sequence() => {
                self.sequence_repeat(seq.repeat_func(), a, b)?
            }
            (BinaryOp::Mult, (Some(ContainerKind::Index), Some(seq))) if seq.is_sequence() => {
                self.sequence_repeat(seq.repeat_func(), b, a)?
            }
            (
                BinaryOp::Sub | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor,
                (Some(ContainerKind::Set), Some(ContainerKind::Set)),
            ) => set::set_combine(self, op, a, b)?,
            _ => return Ok(None),
        };
        Ok(Some(Native::Object(result)))
    }
}

/// Payload kinds the container fast path distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Str,
    List,
    Tuple,
    /// `set` or `frozenset`.
    Set,
    /// An integer usable as a repeat count.
    Index,
}

impl ContainerKind {
    fn of(data: &HeapData) -> Option<Self> {
        match data {
            HeapData::Str(_) => Some(Self::Str),
            HeapData::List(_) => Some(Self::List),
            HeapData::Tuple(_) => Some(Self::Tuple),
            HeapData::Set(_) | HeapData::FrozenSet(_) => Some(Self::Set),
            HeapData::Bool(_) | HeapData::Int(_) | HeapData::Long(_) => Some(Self::Index),
            _ => None,
        }
    }

    fn is_sequence(self) -> bool {
        matches!(self, Self::Str | Self::List | Self::Tuple)
    }

    fn repeat_func(self) -> crate::slots::RepeatFunc {
        match self {
            Self::Str => sequence::str_repeat,
            Self::List => sequence::list_repeat,
            _ => sequence::tuple_repeat,
        }
    }
}
