//! Type slots and the slot resolver.
//!
//! A type's numeric table holds one optional binary slot and one optional in-place slot per
//! operator. Slots receive both operands in source order, whichever side they were found on,
//! and answer with a value or [`SlotResult::NotImplemented`] so dispatch can move on to the
//! next candidate.

use strum::EnumCount;

use crate::{
    BinaryOp,
    exception_private::RunResult,
    object::Obj,
    runtime::Runtime,
    types::{TypeId, TypeRegistry},
};

/// Outcome of a binary or in-place slot.
#[derive(Debug)]
pub enum SlotResult {
    /// The slot produced a new reference.
    Value(Obj),
    /// The slot does not handle this operand combination.
    NotImplemented,
}

/// Outcome of a legacy coercion slot.
#[derive(Debug)]
pub enum Coercion {
    /// Both operands converted to a common representation; the caller owns both references.
    Coerced(Obj, Obj),
    NotPossible,
}

/// `fn(runtime, left, right)` implementing one operator for a type.
pub type BinaryFunc = fn(&mut Runtime, &Obj, &Obj) -> RunResult<SlotResult>;

/// Legacy two-sided coercion: `fn(runtime, self, other)`.
pub type CoerceFunc = fn(&mut Runtime, &Obj, &Obj) -> RunResult<Coercion>;

/// Truth-value slot.
pub type TruthFunc = fn(&mut Runtime, &Obj) -> RunResult<bool>;

/// Sequence concatenation; errors are raised directly since it is the last resort for `+`.
pub type ConcatFunc = fn(&mut Runtime, &Obj, &Obj) -> RunResult<Obj>;

/// Sequence repetition by an already converted count.
pub type RepeatFunc = fn(&mut Runtime, &Obj, i64) -> RunResult<Obj>;

/// The numeric capability table of a type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberMethods {
    pub(crate) binary: [Option<BinaryFunc>; BinaryOp::COUNT],
    pub(crate) inplace: [Option<BinaryFunc>; BinaryOp::COUNT],
    pub(crate) coerce: Option<CoerceFunc>,
}

impl NumberMethods {
    pub(crate) fn install(&mut self, table: &[(BinaryOp, BinaryFunc)]) {
        for &(op, func) in table {
            self.binary[op.index()] = Some(func);
        }
    }

    pub(crate) fn install_inplace(&mut self, table: &[(BinaryOp, BinaryFunc)]) {
        for &(op, func) in table {
            self.inplace[op.index()] = Some(func);
        }
    }
}

/// The sequence capability table of a type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceMethods {
    pub concat: Option<ConcatFunc>,
    pub repeat: Option<RepeatFunc>,
    pub inplace_concat: Option<ConcatFunc>,
    pub inplace_repeat: Option<RepeatFunc>,
}

/// Whether two slots are the same implementation, as when one was inherited from the other.
#[inline]
#[must_use]
pub fn same_slot(a: BinaryFunc, b: BinaryFunc) -> bool {
    std::ptr::fn_addr_eq(a, b)
}

impl TypeRegistry {
    /// The binary slot `type` exposes for `op` to operator dispatch.
    ///
    /// Legacy-style numeric types only take part through coercion, so their slots are hidden
    /// here even when populated.
    #[must_use]
    pub fn get_slot(&self, tp: TypeId, op: BinaryOp) -> Option<BinaryFunc> {
        let tp = self.get(tp);
        if !tp.is_new_style_number() {
            return None;
        }
        tp.number()?.binary[op.index()]
    }

    #[must_use]
    pub fn get_inplace_slot(&self, tp: TypeId, op: BinaryOp) -> Option<BinaryFunc> {
        self.get(tp).number()?.inplace[op.index()]
    }

    #[must_use]
    pub fn coerce_slot(&self, tp: TypeId) -> Option<CoerceFunc> {
        self.get(tp).number()?.coerce
    }

    /// The binary slot called after a successful coercion, regardless of numeric style.
    #[must_use]
    pub(crate) fn coerced_slot(&self, tp: TypeId, op: BinaryOp) -> Option<BinaryFunc> {
        self.get(tp).number()?.binary[op.index()]
    }

    #[must_use]
    pub fn sequence(&self, tp: TypeId) -> Option<&SequenceMethods> {
        self.get(tp).sequence()
    }

    #[must_use]
    pub fn truth_slot(&self, tp: TypeId) -> Option<TruthFunc> {
        self.get(tp).truth()
    }
}

/// Generates one slot function per operator, each forwarding to a shared handler taking the
/// operator as an argument, plus a `(BinaryOp, BinaryFunc)` table listing them.
macro_rules! slot_table {
    ($table:ident, $handler:ident; $($op:ident => $name:ident),* $(,)?) => {
        $(
            fn $name(
                rt: &mut $crate::runtime::Runtime,
                a: &$crate::object::Obj,
                b: &$crate::object::Obj,
            ) -> $crate::exception_private::RunResult<$crate::slots::SlotResult> {
                $handler(rt, $crate::BinaryOp::$op, a, b)
            }
        )*

        pub(crate) const $table: &[($crate::BinaryOp, $crate::slots::BinaryFunc)] =
            &[$(($crate::BinaryOp::$op, $name as $crate::slots::BinaryFunc)),*];
    };
}
pub(crate) use slot_table;
