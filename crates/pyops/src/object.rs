use std::mem::ManuallyDrop;

use crate::heap::{Heap, HeapId};

/// An owned, reference-counted reference to a runtime object.
///
/// Holding an `Obj` means holding exactly one unit of the object's reference count. `Obj` is
/// deliberately not `Clone`: a new reference is taken with [`Obj::clone_with_heap`] (or
/// `Runtime::new_ref`) and a reference is given back with [`Obj::drop_with_heap`] (or
/// `Runtime::release`). Functions that return `Obj` transfer one reference to the caller;
/// functions that take `&Obj` only borrow.
///
/// With the `ref-count-panic` feature enabled, dropping an `Obj` without releasing it panics,
/// which turns reference leaks into test failures.
#[derive(Debug)]
pub struct Obj(HeapId);

impl Obj {
    /// Adopts the reference that `Heap::allocate` (or an explicit `inc_ref`) produced.
    #[inline]
    pub(crate) fn from_raw(id: HeapId) -> Self {
        Self(id)
    }

    /// Gives up ownership without touching the reference count.
    #[inline]
    pub(crate) fn into_raw(self) -> HeapId {
        let this = ManuallyDrop::new(self);
        this.0
    }

    /// The heap slot this reference points at.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HeapId {
        self.0
    }

    /// Object identity, the `is` operator.
    #[inline]
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    /// Takes a new reference to the same object.
    #[must_use]
    pub(crate) fn clone_with_heap(&self, heap: &Heap) -> Self {
        heap.inc_ref(self.0);
        Self(self.0)
    }

    /// Releases this reference, freeing the object when it was the last one.
    pub(crate) fn drop_with_heap(self, heap: &mut Heap) {
        heap.dec_ref(self.into_raw());
    }
}

#[cfg(feature = "ref-count-panic")]
impl Drop for Obj {
    fn drop(&mut self) {
        panic!("Obj({:?}) dropped without being released", self.0);
    }
}
