//! Augmented assignment: `a op= b`.

use super::{OperationForm, SlotSide, native::Native};
use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError, RunResult},
    heap::HeapData,
    object::Obj,
    runtime::Runtime,
};

impl Runtime {
    /// `target op= value`.
    ///
    /// On success `target` is rebound to the result and the reference it held before is
    /// released; the result may be the same object when the operation mutated it. On failure
    /// `target` is left untouched.
    pub fn inplace_operation(&mut self, op: BinaryOp, target: &mut Obj, value: &Obj) -> RunResult<()> {
        let Some(symbol) = op.inplace_symbol() else {
            return Err(RunError::internal(format!("operator {op} has no in-place form")));
        };
        if !self.dialect.supports_operator(op) {
            return Err(RunError::internal(format!(
                "operator {op} does not exist in dialect {}",
                self.dialect.kind()
            )));
        }
        self.trace_dispatch(op, OperationForm::InPlace, self.type_of(target), self.type_of(value));

        if let Some(native) = self.native_numeric(op, target, value)? {
            self.trace_fast_path(op, OperationForm::InPlace);
            if self.overwrite_exclusive(target, &native) {
                self.trace_inplace_reuse(op);
                return Ok(());
            }
            let result = native.into_obj(self, target, value)?;
            self.rebind(target, result);
            return Ok(());
        }

        let result = self.inplace_protocol(op, symbol, target, value)?;
        self.rebind(target, result);
        Ok(())
    }

    fn inplace_protocol(&mut self, op: BinaryOp, symbol: &str, a: &Obj, b: &Obj) -> RunResult<Obj> {
        let t1 = self.type_of(a);
        if let Some(slot) = self.types.get_inplace_slot(t1, op)
            && let Some(result) = self.call_slot(slot, op, t1, SlotSide::InPlace, a, b)?
        {
            return Ok(result);
        }
        if let Some(result) = self.binary_slots(op, a, b)? {
            return Ok(result);
        }
        if let Some(result) = self.inplace_sequence_fallback(op, a, b)? {
            return Ok(result);
        }
        Err(ExcType::binary_type_error(symbol, self.type_name(a), self.type_name(b)))
    }

    /// The left operand's in-place concatenation or repetition, falling back to the plain
    /// ones. The right operand of `*=` is only ever repeated, never mutated.
    fn inplace_sequence_fallback(&mut self, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Option<Obj>> {
        let t1 = self.type_of(a);
        let left = self.types.sequence(t1).copied();
        match op {
            BinaryOp::Add => {
                let Some(concat) = left.and_then(|seq| seq.inplace_concat.or(seq.concat)) else {
                    return Ok(None);
                };
                self.trace_sequence_fallback(op, t1);
                concat(self, a, b).map(Some)
            }
            BinaryOp::Mult => {
                if let Some(seq) = left {
                    let Some(repeat) = seq.inplace_repeat.or(seq.repeat) else {
                        return Ok(None);
                    };
                    self.trace_sequence_fallback(op, t1);
                    return self.sequence_repeat(repeat, a, b).map(Some);
                }
                let t2 = self.type_of(b);
                let Some(repeat) = self.types.sequence(t2).and_then(|seq| seq.repeat) else {
                    return Ok(None);
                };
                self.trace_sequence_fallback(op, t2);
                self.sequence_repeat(repeat, b, a).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Stores a fixed-width numeric result straight into `target` when nothing else can
    /// observe it. Returns whether it did.
    fn overwrite_exclusive(&mut self, target: &Obj, native: &Native) -> bool {
        if self.refcount(target) != 1 || self.is_singleton(target) {
            return false;
        }
        match (self.heap.get_mut(target.id()), native) {
            (HeapData::Int(slot), Native::Int(value)) => *slot = *value,
            (HeapData::Float(slot), Native::Float(value)) => *slot = *value,
            _ => return false,
        }
        true
    }

    fn rebind(&mut self, target: &mut Obj, result: Obj) {
        let old = std::mem::replace(target, result);
        self.release(old);
    }
}
