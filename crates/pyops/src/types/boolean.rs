//! `bool` overrides the bitwise operators of `int` so that two booleans stay boolean.

use super::int::{IntFlavor, int_slot};
use crate::{
    BinaryOp,
    dispatch::native::bool_logic,
    exception_private::RunResult,
    heap::HeapData,
    object::Obj,
    runtime::Runtime,
    slots::{SlotResult, slot_table},
};

fn bool_slot(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    if let (HeapData::Bool(p), HeapData::Bool(q)) = (rt.payload(a), rt.payload(b)) {
        let result = bool_logic(op, *p, *q);
        return Ok(SlotResult::Value(rt.bool_obj(result)));
    }
    let flavor = IntFlavor::for_int_type(rt.dialect());
    int_slot(rt, flavor, op, a, b)
}

slot_table!(BOOL_SLOTS, bool_slot;
    BitAnd => bool_and, BitOr => bool_or, BitXor => bool_xor,
);
