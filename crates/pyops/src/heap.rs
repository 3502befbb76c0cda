use std::{
    collections::BTreeMap,
    mem::{ManuallyDrop, size_of},
    sync::atomic::{AtomicUsize, Ordering},
};

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    object::Obj,
    resource::{ResourceError, ResourceLimits},
    types::{Instance, LongInt, SetStorage},
};

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order, so two
/// snapshots can be compared directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Number of free (recycled) slots available for reuse.
    pub free_slots: usize,
    /// Total heap capacity (live + free).
    pub total_slots: usize,
    /// Breakdown of live objects by payload kind ("Int", "Float", "List", ...).
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Estimated bytes held by live objects.
    pub memory_bytes: usize,
}

/// Unique identifier for objects stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a heap object.
///
/// The variant decides the object's builtin representation; the object's *type* is derived
/// from it (and from the class id for instances) by the runtime.
#[derive(Debug, IntoStaticStr)]
pub(crate) enum HeapData {
    None,
    Bool(bool),
    /// Fixed-width integer representation.
    Int(i64),
    /// Arbitrary-precision integer representation.
    Long(LongInt),
    Float(f64),
    Str(String),
    List(Vec<Obj>),
    Tuple(Vec<Obj>),
    Set(SetStorage),
    FrozenSet(SetStorage),
    Instance(Instance),
}

impl HeapData {
    /// Rough memory footprint, used for the memory limit.
    fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) => 0,
            Self::Long(li) => li.estimate_size(),
            Self::Str(s) => s.len(),
            Self::List(items) | Self::Tuple(items) => items.len() * size_of::<Obj>(),
            Self::Set(storage) | Self::FrozenSet(storage) => storage.estimate_size(),
            Self::Instance(inst) => inst.estimate_size(),
        };
        size_of::<Self>() + payload
    }

    /// Moves every reference this payload owns into `stack`.
    ///
    /// Afterwards the payload holds no `Obj`s, so it can be dropped without touching
    /// reference counts.
    fn take_children(&mut self, stack: &mut Vec<HeapId>) {
        match self {
            Self::List(items) | Self::Tuple(items) => stack.extend(items.drain(..).map(Obj::into_raw)),
            Self::Set(storage) | Self::FrozenSet(storage) => storage.take_children(stack),
            Self::Instance(inst) => inst.take_children(stack),
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Str(_) => {}
        }
    }
}

/// A single heap slot: reference count plus payload.
#[derive(Debug)]
struct HeapValue {
    refcount: AtomicUsize,
    data: HeapData,
    size: usize,
}

/// Reference-counted arena that backs every runtime object.
///
/// Uses a free list to reuse slots from freed objects, keeping memory usage constant for
/// long-running loops that repeatedly allocate and free values. When an object is freed via
/// `dec_ref`, its slot ID is added to the free list and its children are released.
#[derive(Debug)]
pub(crate) struct Heap {
    entries: Vec<Option<HeapValue>>,
    free_list: Vec<HeapId>,
    limits: ResourceLimits,
    live: usize,
    memory_used: usize,
}

impl Heap {
    pub fn new(capacity: usize, limits: ResourceLimits) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            limits,
            live: 0,
            memory_used: 0,
        }
    }

    /// Allocates a new heap entry with a reference count of one.
    ///
    /// Returns `Err(ResourceError)` if allocation would exceed the configured limits; the
    /// references the payload owned are released in that case.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        let size = data.estimate_size();
        if let Err(err) = self.limits.check_allocation(self.live, self.memory_used, size) {
            self.discard(data);
            return Err(err);
        }
        self.live += 1;
        self.memory_used += size;

        let new_entry = HeapValue {
            refcount: AtomicUsize::new(1),
            data,
            size,
        };
        let id = if let Some(id) = self.free_list.pop() {
            self.entries[id.index()] = Some(new_entry);
            id
        } else {
            let id = HeapId(self.entries.len());
            self.entries.push(Some(new_entry));
            id
        };
        Ok(id)
    }

    /// Increments the reference count for an existing heap entry.
    ///
    /// Uses interior mutability for the refcount, so only shared access to the heap
    /// is required.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    pub fn inc_ref(&self, id: HeapId) {
        self.entry(id).refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the reference count and frees the object (plus children) once it hits zero.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let Some(mut data) = self.release_one(id) else {
            return;
        };
        let mut stack = Vec::new();
        data.take_children(&mut stack);
        while let Some(child) = stack.pop() {
            if let Some(mut child_data) = self.release_one(child) {
                child_data.take_children(&mut stack);
            }
        }
    }

    /// Releases the references held by a payload that never made it onto the heap.
    fn discard(&mut self, mut data: HeapData) {
        let mut stack = Vec::new();
        data.take_children(&mut stack);
        for child in stack {
            self.dec_ref(child);
        }
    }

    /// Drops one reference; returns the payload when the slot was freed.
    fn release_one(&mut self, id: HeapId) -> Option<HeapData> {
        let slot = self.entries.get_mut(id.index()).expect("Heap::dec_ref: slot missing");
        let entry = slot.as_mut().expect("Heap::dec_ref: object already freed");
        let count = entry.refcount.load(Ordering::Relaxed);
        if count > 1 {
            entry.refcount.store(count - 1, Ordering::Relaxed);
            return None;
        }
        let value = slot.take().expect("Heap::dec_ref: object already freed");
        self.free_list.push(id);
        self.live -= 1;
        self.memory_used = self.memory_used.saturating_sub(value.size);
        Some(value.data)
    }

    fn entry(&self, id: HeapId) -> &HeapValue {
        self.entries
            .get(id.index())
            .expect("Heap: slot missing")
            .as_ref()
            .expect("Heap: object already freed")
    }

    /// Returns an immutable reference to the payload stored at the given ID.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entry(id).data
    }

    /// Returns a mutable reference to the payload stored at the given ID.
    ///
    /// Callers that grow a container must call [`Heap::refresh_size`] afterwards.
    ///
    /// # Panics
    /// Panics if the ID is invalid or the object has already been freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self
            .entries
            .get_mut(id.index())
            .expect("Heap::get_mut: slot missing")
            .as_mut()
            .expect("Heap::get_mut: object already freed")
            .data
    }

    /// Recomputes the memory estimate of an object after in-place mutation.
    pub fn refresh_size(&mut self, id: HeapId) -> Result<(), ResourceError> {
        let entry = self
            .entries
            .get_mut(id.index())
            .expect("Heap::refresh_size: slot missing")
            .as_mut()
            .expect("Heap::refresh_size: object already freed");
        let new_size = entry.data.estimate_size();
        let old_size = std::mem::replace(&mut entry.size, new_size);
        self.memory_used = self.memory_used.saturating_sub(old_size) + new_size;
        if new_size > old_size {
            self.limits.check_large_result(self.memory_used - new_size, new_size)?;
        }
        Ok(())
    }

    /// Current reference count of a live object.
    #[must_use]
    pub fn get_refcount(&self, id: HeapId) -> usize {
        self.entry(id).refcount.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.entries.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Estimated bytes held by live objects.
    #[must_use]
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        for entry in self.entries.iter().flatten() {
            let name: &'static str = (&entry.data).into();
            *objects_by_type.entry(name).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.live,
            free_slots: self.free_list.len(),
            total_slots: self.entries.len(),
            objects_by_type,
            memory_bytes: self.memory_used,
        }
    }
}

#[cfg(feature = "ref-count-panic")]
impl Drop for Heap {
    fn drop(&mut self) {
        // disarm references still held by live containers
        let mut sink = Vec::new();
        for entry in self.entries.iter_mut().flatten() {
            entry.data.take_children(&mut sink);
        }
    }
}

/// Anything that owns the heap: the heap itself or the runtime wrapping it.
pub(crate) trait ContainsHeap {
    fn heap_mut(&mut self) -> &mut Heap;
}

impl ContainsHeap for Heap {
    #[inline]
    fn heap_mut(&mut self) -> &mut Self {
        self
    }
}

/// Trait for types that require heap access for proper cleanup.
///
/// Rust's standard `Drop` trait cannot decrement heap reference counts because it has no
/// access to the `Heap`. This trait provides an explicit drop-with-heap method so that
/// references (and containers of them) can properly decrement their counts when they are no
/// longer needed.
///
/// **All types implementing this trait must be cleaned up on every code path**, early
/// returns and `?` included. Prefer [`defer_drop!`] or [`HeapGuard`] to guarantee cleanup
/// automatically rather than inserting manual calls in every branch.
pub(crate) trait DropWithHeap {
    /// Consume `self` and decrement reference counts for any heap references contained within.
    fn drop_with_heap(self, heap: &mut Heap);
}

impl DropWithHeap for Obj {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap) {
        Self::drop_with_heap(self, heap);
    }
}

impl<U: DropWithHeap> DropWithHeap for Option<U> {
    #[inline]
    fn drop_with_heap(self, heap: &mut Heap) {
        if let Some(value) = self {
            value.drop_with_heap(heap);
        }
    }
}

impl<U: DropWithHeap> DropWithHeap for Vec<U> {
    fn drop_with_heap(self, heap: &mut Heap) {
        for value in self {
            value.drop_with_heap(heap);
        }
    }
}

impl DropWithHeap for (Obj, Obj) {
    fn drop_with_heap(self, heap: &mut Heap) {
        let (left, right) = self;
        left.drop_with_heap(heap);
        right.drop_with_heap(heap);
    }
}

/// RAII guard that ensures a [`DropWithHeap`] value is cleaned up on every code path.
///
/// The guard's `Drop` impl calls [`DropWithHeap::drop_with_heap`] automatically, so
/// cleanup happens whether the scope exits normally, via `?`, or early return.
///
/// Used through the [`defer_drop!`] macro.
pub(crate) struct HeapGuard<'a, H: ContainsHeap, V: DropWithHeap> {
    // manually dropped because it needs to be dropped by move.
    value: ManuallyDrop<V>,
    heap: &'a mut H,
}

impl<'a, H: ContainsHeap, V: DropWithHeap> HeapGuard<'a, H, V> {
    /// Creates a new `HeapGuard` for the given value and heap owner.
    #[inline]
    pub fn new(value: V, heap: &'a mut H) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            heap,
        }
    }

    /// Borrows the value (immutably) and heap owner (mutably) out of the guard.
    ///
    /// This is what [`defer_drop!`] calls internally.
    #[inline]
    pub fn as_parts(&mut self) -> (&V, &mut H) {
        (&self.value, self.heap)
    }
}

impl<H: ContainsHeap, V: DropWithHeap> Drop for HeapGuard<'_, H, V> {
    fn drop(&mut self) {
        // SAFETY: [DH] - value is never manually dropped until this point
        unsafe { ManuallyDrop::take(&mut self.value) }.drop_with_heap(self.heap.heap_mut());
    }
}

/// The preferred way to ensure a [`DropWithHeap`] value is cleaned up on every code path.
///
/// Creates a [`HeapGuard`] and immediately rebinds `$value` as `&V` and `$heap` as
/// `&mut H` via [`HeapGuard::as_parts`]. The owned value is moved into the guard, which
/// releases it when the scope exits.
///
/// # Limitation
///
/// The macro rebinds `$heap` as a new `let` binding, so it cannot be used when `$heap`
/// is `self`. In `&mut self` methods, first assign `let this = self;` and pass `this`.
macro_rules! defer_drop {
    ($value:ident, $heap:ident) => {
        let mut _guard = $crate::heap::HeapGuard::new($value, $heap);
        #[allow(
            clippy::allow_attributes,
            reason = "the reborrowed parts may not both be used in every case, so allow unused vars to avoid warnings"
        )]
        #[allow(unused_variables)]
        let ($value, $heap) = _guard.as_parts();
    };
}
pub(crate) use defer_drop;

#[cfg(test)]
mod tests {
    use super::*;

    fn refcount_inside_scope(heap: &mut Heap, obj: Obj) -> usize {
        defer_drop!(obj, heap);
        heap.get_refcount(obj.id())
    }

    #[test]
    fn deferred_drop_releases_at_scope_exit() {
        let mut heap = Heap::new(0, ResourceLimits::default());
        let id = heap.allocate(HeapData::Int(7)).unwrap();
        heap.inc_ref(id);
        assert_eq!(refcount_inside_scope(&mut heap, Obj::from_raw(id)), 2);
        assert_eq!(heap.get_refcount(id), 1);
        heap.dec_ref(id);
        assert!(!heap.is_live(id));
    }
}
