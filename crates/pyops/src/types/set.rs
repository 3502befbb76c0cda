//! `set` and `frozenset`: storage plus the set-algebra operators `-`, `&`, `|` and `^`.
//!
//! Elements are keyed by a structural [`SetKey`] derived from their value, so `1`, `1.0` and
//! `True` collapse to one element the way equal-hashing values do in the source language.

use std::mem::size_of;

use ahash::RandomState;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError, RunResult},
    heap::{DropWithHeap, Heap, HeapData, HeapId},
    object::Obj,
    runtime::Runtime,
    slots::{NumberMethods, SlotResult, slot_table},
};

/// Hashable identity of a set element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum SetKey {
    None,
    Int(i64),
    Big(BigInt),
    /// Bit pattern of a non-integral float.
    Float(u64),
    Str(String),
    Tuple(Vec<SetKey>),
    /// Sorted keys of a frozenset's elements.
    FrozenSet(Vec<SetKey>),
    /// Objects without value equality compare by identity.
    Identity(HeapId),
}

impl SetKey {
    /// The key of `obj`, or `TypeError` for unhashable values.
    pub fn of(rt: &Runtime, obj: &Obj) -> RunResult<Self> {
        Self::of_data(rt, obj.id(), rt.heap.get(obj.id()))
    }

    fn of_data(rt: &Runtime, id: HeapId, data: &HeapData) -> RunResult<Self> {
        Ok(match data {
            HeapData::None => Self::None,
            HeapData::Bool(b) => Self::Int(i64::from(*b)),
            HeapData::Int(i) => Self::Int(*i),
            HeapData::Long(li) => li.inner().to_i64().map_or_else(|| Self::Big(li.inner().clone()), Self::Int),
            HeapData::Float(f) => float_key(*f),
            HeapData::Str(s) => Self::Str(s.clone()),
            HeapData::Tuple(items) => Self::Tuple(items.iter().map(|item| Self::of(rt, item)).collect::<RunResult<_>>()?),
            HeapData::FrozenSet(storage) => {
                let mut keys: Vec<Self> = storage.entries.keys().cloned().collect();
                keys.sort_unstable();
                Self::FrozenSet(keys)
            }
            HeapData::List(_) => return Err(ExcType::unhashable("list")),
            HeapData::Set(_) => return Err(ExcType::unhashable("set")),
            HeapData::Instance(inst) => match inst.base_value() {
                Some(base) => Self::of(rt, base)?,
                None => Self::Identity(id),
            },
        })
    }
}

#[expect(clippy::cast_possible_truncation, reason = "range checked against the i64 bounds first")]
fn float_key(value: f64) -> SetKey {
    if value.is_finite() && value.fract() == 0.0 {
        if value >= -9_223_372_036_854_775_808.0 && value < 9_223_372_036_854_775_808.0 {
            return SetKey::Int(value as i64);
        }
        if let Some(big) = BigInt::from_f64(value) {
            return SetKey::Big(big);
        }
    }
    SetKey::Float(value.to_bits())
}

/// Insertion-ordered element storage shared by `set` and `frozenset`.
#[derive(Debug, Default)]
pub(crate) struct SetStorage {
    entries: IndexMap<SetKey, Obj, RandomState>,
}

impl SetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds storage from owned references, releasing duplicates.
    pub fn from_items(rt: &mut Runtime, items: Vec<Obj>) -> RunResult<Self> {
        let keys: RunResult<Vec<SetKey>> = items.iter().map(|item| SetKey::of(rt, item)).collect();
        let keys = match keys {
            Ok(keys) => keys,
            Err(err) => {
                items.drop_with_heap(&mut rt.heap);
                return Err(err);
            }
        };
        let mut storage = Self::new();
        for (key, item) in keys.into_iter().zip(items) {
            storage.insert(key, item, &mut rt.heap);
        }
        Ok(storage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SetKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &Obj> {
        self.entries.values()
    }

    /// Adds an element; an equal element already present wins and `value` is released.
    pub fn insert(&mut self, key: SetKey, value: Obj, heap: &mut Heap) {
        if self.entries.contains_key(&key) {
            value.drop_with_heap(heap);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// The result of `self op other` as new storage holding new references.
    pub fn combine(&self, op: BinaryOp, other: &Self, heap: &Heap) -> Self {
        let mut result = Self::new();
        let mut copy = |key: &SetKey, value: &Obj| {
            result.entries.insert(key.clone(), value.clone_with_heap(heap));
        };
        match op {
            BinaryOp::Sub => {
                self.entries.iter().filter(|(k, _)| !other.contains(k)).for_each(|(k, v)| copy(k, v));
            }
            BinaryOp::BitAnd => {
                self.entries.iter().filter(|(k, _)| other.contains(k)).for_each(|(k, v)| copy(k, v));
            }
            BinaryOp::BitOr => {
                self.entries.iter().for_each(|(k, v)| copy(k, v));
                other.entries.iter().filter(|(k, _)| !self.contains(k)).for_each(|(k, v)| copy(k, v));
            }
            _ => {
                self.entries.iter().filter(|(k, _)| !other.contains(k)).for_each(|(k, v)| copy(k, v));
                other.entries.iter().filter(|(k, _)| !self.contains(k)).for_each(|(k, v)| copy(k, v));
            }
        }
        result
    }

    pub fn estimate_size(&self) -> usize {
        self.entries.len() * (size_of::<SetKey>() + size_of::<Obj>())
    }

    pub fn take_children(&mut self, stack: &mut Vec<HeapId>) {
        stack.extend(self.entries.drain(..).map(|(_, value)| value.into_raw()));
    }

    fn release(mut self, heap: &mut Heap) {
        for (_, value) in self.entries.drain(..) {
            value.drop_with_heap(heap);
        }
    }
}

fn storage_of(data: &HeapData) -> Option<&SetStorage> {
    match data {
        HeapData::Set(storage) | HeapData::FrozenSet(storage) => Some(storage),
        _ => None,
    }
}

/// `a op b` for two set operands; the result has the builtin kind of `a`.
pub(crate) fn set_combine(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<Obj> {
    let (storage, frozen) = {
        let left = rt.payload(a);
        let (Some(x), Some(y)) = (storage_of(left), storage_of(rt.payload(b))) else {
            return Err(RunError::internal("set operator called on non-set operands"));
        };
        (x.combine(op, y, &rt.heap), matches!(left, HeapData::FrozenSet(_)))
    };
    let data = if frozen {
        HeapData::FrozenSet(storage)
    } else {
        HeapData::Set(storage)
    };
    rt.alloc(data)
}

fn set_binary(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    if storage_of(rt.payload(a)).is_none() || storage_of(rt.payload(b)).is_none() {
        return Ok(SlotResult::NotImplemented);
    }
    Ok(SlotResult::Value(set_combine(rt, op, a, b)?))
}

/// `a op= b`: replaces the contents of `a` and returns it.
fn set_inplace(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    let target = rt.payload_id(a);
    let combined = {
        let (Some(x), Some(y)) = (storage_of(rt.heap.get(target)), storage_of(rt.payload(b))) else {
            return Ok(SlotResult::NotImplemented);
        };
        x.combine(op, y, &rt.heap)
    };
    let old = match rt.heap.get_mut(target) {
        HeapData::Set(storage) => std::mem::replace(storage, combined),
        _ => {
            combined.release(&mut rt.heap);
            return Ok(SlotResult::NotImplemented);
        }
    };
    old.release(&mut rt.heap);
    rt.heap.refresh_size(target)?;
    Ok(SlotResult::Value(rt.new_ref(a)))
}

slot_table!(SET_SLOTS, set_binary;
    Sub => set_sub, BitAnd => set_and, BitOr => set_or, BitXor => set_xor,
);

slot_table!(SET_INPLACE_SLOTS, set_inplace;
    Sub => set_isub, BitAnd => set_iand, BitOr => set_ior, BitXor => set_ixor,
);

pub(crate) fn set_methods() -> NumberMethods {
    let mut methods = frozenset_methods();
    methods.install_inplace(SET_INPLACE_SLOTS);
    methods
}

pub(crate) fn frozenset_methods() -> NumberMethods {
    let mut methods = NumberMethods::default();
    methods.install(SET_SLOTS);
    methods
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_share_int_keys() {
        assert_eq!(float_key(3.0), SetKey::Int(3));
        assert_eq!(float_key(-0.0), SetKey::Int(0));
        assert_eq!(float_key(0.5), SetKey::Float(0.5f64.to_bits()));
        assert_eq!(float_key(1e20), SetKey::Big(BigInt::from(100_000_000_000_000_000_000_u128)));
    }
}
