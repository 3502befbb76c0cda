//! Operator dispatch.
//!
//! Every binary operator expression of compiled code ends up in one of the entry points here.
//! Exact builtin operands are computed directly by the native kernels; everything else goes
//! through the slot protocol:
//!
//! 1. the left type's slot and, for a different type, the right type's slot, with the right
//!    one tried first when its type is a strict subtype of the left type;
//! 2. legacy two-sided coercion, when the dialect has it;
//! 3. the sequence capabilities, for `+` and `*`;
//! 4. `TypeError: unsupported operand type(s) for ...`.
//!
//! A slot answering `NotImplemented` moves on to the next candidate; an error ends dispatch
//! immediately.

mod inplace;
pub(crate) mod native;

use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use self::native::Native;
use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError, RunResult},
    heap::HeapData,
    object::Obj,
    runtime::Runtime,
    slots::{BinaryFunc, RepeatFunc, SlotResult, same_slot},
    types::TypeId,
};

/// How the caller consumes the result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationForm {
    /// A new reference.
    Binary,
    /// Only the truth value.
    Bool,
    /// Rebound to the left operand.
    InPlace,
}

/// Which slot of an operation was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotSide {
    /// The left operand type's binary slot.
    Left,
    /// The right operand type's binary slot (operands still in source order).
    Right,
    /// The left operand type's in-place slot.
    InPlace,
}

impl Runtime {
    /// `a op b`, returning a new reference.
    pub fn binary_operation(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Obj> {
        self.check_operator(op)?;
        self.trace_dispatch(op, OperationForm::Binary, self.type_of(a), self.type_of(b));
        self.dispatch_binary(op, a, b)
    }

    /// [`binary_operation`](Self::binary_operation) after the operator check and the dispatch
    /// event.
    pub(crate) fn dispatch_binary(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Obj> {
        if let Some(native) = self.fast_path(op, a, b)? {
            self.trace_fast_path(op, OperationForm::Binary);
            return native.into_obj(self, a, b);
        }
        self.generic_binary(op, a, b)
    }

    /// The truth value of `a op b`, as used by `if a op b:`.
    ///
    /// Results of the native kernels are never allocated.
    pub fn binary_operation_bool(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<bool> {
        self.check_operator(op)?;
        self.trace_dispatch(op, OperationForm::Bool, self.type_of(a), self.type_of(b));
        self.dispatch_binary_bool(op, a, b)
    }

    pub(crate) fn dispatch_binary_bool(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<bool> {
        if let Some(native) = self.fast_path(op, a, b)? {
            self.trace_fast_path(op, OperationForm::Bool);
            return native.truth(self, a, b);
        }
        let result = self.generic_binary(op, a, b)?;
        let truth = self.is_true(&result);
        self.release(result);
        truth
    }

    /// `a op b` through the slot protocol alone, skipping the native kernels.
    ///
    /// For exact builtin operands this gives the same result as [`binary_operation`](Self::binary_operation).
    pub fn binary_operation_via_slots(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Obj> {
        self.check_operator(op)?;
        self.trace_dispatch(op, OperationForm::Binary, self.type_of(a), self.type_of(b));
        self.generic_binary(op, a, b)
    }

    pub(crate) fn check_operator(&self, op: BinaryOp) -> RunResult<()> {
        if self.dialect.supports_operator(op) {
            Ok(())
        } else {
            Err(RunError::internal(format!(
                "operator {op} does not exist in dialect {}",
                self.dialect.kind()
            )))
        }
    }

    /// The native kernels: `None` unless both operands are exact builtins they cover.
    fn fast_path(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Native>> {
        if let Some(native) = self.native_numeric(op, a, b)? {
            return Ok(Some(native));
        }
        self.native_container(op, a, b)
    }

    /// The full protocol for operands the native kernels did not take.
    fn generic_binary(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Obj> {
        if let Some(result) = self.binary_slots(op, a, b)? {
            return Ok(result);
        }
        if let Some(result) = self.sequence_fallback(op, a, b)? {
            return Ok(result);
        }
        Err(ExcType::binary_type_error(op.symbol(), self.type_name(a), self.type_name(b)))
    }

    /// Both operand slots, subclass first, then coercion. `None` when every candidate
    /// declined.
    pub(crate) fn binary_slots(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Obj>> {
        let t1 = self.type_of(a);
        let t2 = self.type_of(b);
        let slot1 = self.types.get_slot(t1, op);
        let mut slot2 = if t1 == t2 {
            None
        } else {
            self.types
                .get_slot(t2, op)
                .filter(|&s2| slot1.is_none_or(|s1| !same_slot(s1, s2)))
        };

        if let Some(s1) = slot1 {
            if let Some(s2) = slot2
                && self.types.is_subtype(t2, t1)
            {
                if let Some(result) = self.call_slot(s2, op, t2, SlotSide::Right, a, b)? {
                    return Ok(Some(result));
                }
                slot2 = None;
            }
            if let Some(result) = self.call_slot(s1, op, t1, SlotSide::Left, a, b)? {
                return Ok(Some(result));
            }
        }
        if let Some(s2) = slot2
            && let Some(result) = self.call_slot(s2, op, t2, SlotSide::Right, a, b)?
        {
            return Ok(Some(result));
        }

        let dialect = self.dialect;
        dialect.coerce_fallback(self, op, a, b)
    }

    /// Calls one slot, reporting the outcome to the tracer.
    pub(crate) fn call_slot(
        &mut self,
        slot: BinaryFunc,
        op: BinaryOp,
        owner: TypeId,
        side: SlotSide,
        a: &Obj,
        b: &Obj,
    ) -> RunResult<Option<Obj>> {
        let result = slot(self, a, b)?;
        let implemented = matches!(result, SlotResult::Value(_));
        self.trace_slot(op, owner, side, implemented);
        Ok(match result {
            SlotResult::Value(value) => Some(value),
            SlotResult::NotImplemented => None,
        })
    }

    /// `+` falls back to the left operand's concatenation, `*` to repetition by whichever
    /// operand is a sequence, the left one first.
    fn sequence_fallback(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Obj>> {
        let t1 = self.type_of(a);
        let t2 = self.type_of(b);
        match op {
            BinaryOp::Add => {
                let Some(concat) = self.types.sequence(t1).and_then(|seq| seq.concat) else {
                    return Ok(None);
                };
                self.trace_sequence_fallback(op, t1);
                concat(self, a, b).map(Some)
            }
            BinaryOp::Mult => {
                if let Some(repeat) = self.types.sequence(t1).and_then(|seq| seq.repeat) {
                    self.trace_sequence_fallback(op, t1);
                    return self.sequence_repeat(repeat, a, b).map(Some);
                }
                if let Some(repeat) = self.types.sequence(t2).and_then(|seq| seq.repeat) {
                    self.trace_sequence_fallback(op, t2);
                    return self.sequence_repeat(repeat, b, a).map(Some);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Repeats `seq` by `count`, which has to be an integer that fits an index.
    pub(crate) fn sequence_repeat(&mut self, repeat: RepeatFunc, seq: &Obj, count: &Obj) -> RunResult<Obj> {
        let count = self.repeat_count(count)?;
        repeat(self, seq, count)
    }

    fn repeat_count(&self, count: &Obj) -> RunResult<i64> {
        match self.payload(count) {
            HeapData::Bool(b) => Ok(i64::from(*b)),
            HeapData::Int(i) => Ok(*i),
            HeapData::Long(li) => li.inner().to_i64().ok_or_else(ExcType::overflow_repeat_count),
            _ => Err(ExcType::cant_multiply_sequence(self.type_name(count))),
        }
    }
}
