//! Sequence capabilities of `str`, `list` and `tuple`.
//!
//! These are the last resort for `+` and `*` once numeric dispatch found nothing: the
//! concatenation slot raises its own error for a mismatched right operand, and repetition
//! receives a count that dispatch has already converted to a machine integer.

use std::mem::size_of;

use crate::{
    exception_private::{ExcType, RunResult},
    heap::{DropWithHeap, HeapData},
    object::Obj,
    runtime::Runtime,
    slots::SequenceMethods,
};

pub(crate) fn str_methods() -> SequenceMethods {
    SequenceMethods {
        concat: Some(str_concat),
        repeat: Some(str_repeat),
        inplace_concat: None,
        inplace_repeat: None,
    }
}

pub(crate) fn list_methods() -> SequenceMethods {
    SequenceMethods {
        concat: Some(list_concat),
        repeat: Some(list_repeat),
        inplace_concat: Some(list_inplace_concat),
        inplace_repeat: Some(list_inplace_repeat),
    }
}

pub(crate) fn tuple_methods() -> SequenceMethods {
    SequenceMethods {
        concat: Some(tuple_concat),
        repeat: Some(tuple_repeat),
        inplace_concat: None,
        inplace_repeat: None,
    }
}

/// Size of `count` copies of `unit` bytes, `None` when it overflows.
fn repeated_size(unit: usize, count: i64) -> Option<usize> {
    unit.checked_mul(usize::try_from(count).ok()?)
}

pub(crate) fn str_concat(rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
    let joined = match (rt.payload(a), rt.payload(b)) {
        (HeapData::Str(x), HeapData::Str(y)) => {
            rt.check_large_result(x.len().checked_add(y.len()))?;
            let mut joined = String::with_capacity(x.len() + y.len());
            joined.push_str(x);
            joined.push_str(y);
            joined
        }
        _ => return Err(rt.dialect().str_concat_error(rt.type_name(b))),
    };
    rt.new_str(joined)
}

pub(crate) fn str_repeat(rt: &mut Runtime, a: &Obj, count: i64) -> RunResult<Obj> {
    let HeapData::Str(s) = rt.payload(a) else {
        return Err(ExcType::cant_multiply_sequence(rt.type_name(a)));
    };
    if count <= 0 || s.is_empty() {
        return rt.new_str(String::new());
    }
    rt.check_large_result(repeated_size(s.len(), count))?;
    let repeated = s.repeat(usize::try_from(count).unwrap_or(usize::MAX));
    rt.new_str(repeated)
}

/// New references to the items of a `list` or `tuple` payload.
fn item_refs(rt: &Runtime, data: &HeapData) -> Option<Vec<Obj>> {
    match data {
        HeapData::List(items) | HeapData::Tuple(items) => {
            Some(items.iter().map(|item| item.clone_with_heap(&rt.heap)).collect())
        }
        _ => None,
    }
}

/// New references to `count` back-to-back copies of `items`.
fn repeat_refs(rt: &Runtime, items: &[Obj], count: i64) -> RunResult<Vec<Obj>> {
    if count <= 0 || items.is_empty() {
        return Ok(Vec::new());
    }
    rt.check_large_result(repeated_size(items.len() * size_of::<Obj>(), count))?;
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    let mut result = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        result.extend(items.iter().map(|item| item.clone_with_heap(&rt.heap)));
    }
    Ok(result)
}

fn concat_items(
    rt: &Runtime,
    a: &Obj,
    b: &Obj,
    seq_name: &str,
    same_kind: fn(&HeapData) -> bool,
) -> RunResult<Vec<Obj>> {
    let right = rt.payload(b);
    if !same_kind(right) {
        return Err(ExcType::concat_type_error(seq_name, rt.type_name(b)));
    }
    let left = rt.payload(a);
    let (Some(mut items), Some(rest)) = (item_refs(rt, left), item_refs(rt, right)) else {
        return Err(ExcType::concat_type_error(seq_name, rt.type_name(b)));
    };
    items.extend(rest);
    Ok(items)
}

pub(crate) fn list_concat(rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
    let items = concat_items(rt, a, b, "list", |d| matches!(d, HeapData::List(_)))?;
    rt.new_list(items)
}

pub(crate) fn tuple_concat(rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
    let items = concat_items(rt, a, b, "tuple", |d| matches!(d, HeapData::Tuple(_)))?;
    rt.new_tuple(items)
}

fn repeat_items(rt: &Runtime, a: &Obj, count: i64) -> RunResult<Vec<Obj>> {
    match rt.payload(a) {
        HeapData::List(items) | HeapData::Tuple(items) => repeat_refs(rt, items, count),
        _ => Err(ExcType::cant_multiply_sequence(rt.type_name(a))),
    }
}

pub(crate) fn list_repeat(rt: &mut Runtime, a: &Obj, count: i64) -> RunResult<Obj> {
    let items = repeat_items(rt, a, count)?;
    rt.new_list(items)
}

pub(crate) fn tuple_repeat(rt: &mut Runtime, a: &Obj, count: i64) -> RunResult<Obj> {
    let items = repeat_items(rt, a, count)?;
    rt.new_tuple(items)
}

/// New references to the elements produced by iterating `obj`.
fn iterate(rt: &mut Runtime, obj: &Obj) -> RunResult<Vec<Obj>> {
    let chars: Vec<String> = match rt.payload(obj) {
        HeapData::Str(s) => s.chars().map(String::from).collect(),
        data => {
            if let Some(items) = item_refs(rt, data) {
                return Ok(items);
            }
            return match data {
                HeapData::Set(storage) | HeapData::FrozenSet(storage) => {
                    Ok(storage.values().map(|item| item.clone_with_heap(&rt.heap)).collect())
                }
                _ => Err(ExcType::not_iterable(rt.type_name(obj))),
            };
        }
    };
    let mut items = Vec::with_capacity(chars.len());
    for ch in chars {
        match rt.new_str(ch) {
            Ok(item) => items.push(item),
            Err(err) => {
                items.drop_with_heap(&mut rt.heap);
                return Err(err);
            }
        }
    }
    Ok(items)
}

/// `list += iterable`: extends the list in place.
pub(crate) fn list_inplace_concat(rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<Obj> {
    let extra = iterate(rt, b)?;
    let target = rt.payload_id(a);
    match rt.heap.get_mut(target) {
        HeapData::List(items) => items.extend(extra),
        _ => {
            extra.drop_with_heap(&mut rt.heap);
            return Err(ExcType::concat_type_error("list", rt.type_name(b)));
        }
    }
    rt.heap.refresh_size(target)?;
    Ok(rt.new_ref(a))
}

/// `list *= count`: repeats the list's items in place.
pub(crate) fn list_inplace_repeat(rt: &mut Runtime, a: &Obj, count: i64) -> RunResult<Obj> {
    let target = rt.payload_id(a);
    let extra = match rt.heap.get(target) {
        HeapData::List(items) if count > 1 => repeat_refs(rt, items, count - 1)?,
        HeapData::List(_) => Vec::new(),
        _ => return Err(ExcType::cant_multiply_sequence(rt.type_name(a))),
    };
    let HeapData::List(items) = rt.heap.get_mut(target) else {
        extra.drop_with_heap(&mut rt.heap);
        return Err(ExcType::cant_multiply_sequence(rt.type_name(a)));
    };
    let removed = if count <= 0 { std::mem::take(items) } else { Vec::new() };
    items.extend(extra);
    removed.drop_with_heap(&mut rt.heap);
    rt.heap.refresh_size(target)?;
    Ok(rt.new_ref(a))
}
