use std::mem::size_of;

use crate::{heap::HeapId, object::Obj, types::TypeId};

/// An instance of a user-defined type.
///
/// Instances of a type deriving from a builtin carry that builtin's payload in `base_value`;
/// operator slots inherited from the builtin operate on it.
#[derive(Debug)]
pub(crate) struct Instance {
    class: TypeId,
    base_value: Option<Obj>,
    fields: Vec<Obj>,
}

impl Instance {
    pub fn new(class: TypeId, base_value: Option<Obj>, fields: Vec<Obj>) -> Self {
        Self {
            class,
            base_value,
            fields,
        }
    }

    pub fn class(&self) -> TypeId {
        self.class
    }

    pub fn base_value(&self) -> Option<&Obj> {
        self.base_value.as_ref()
    }

    pub fn fields(&self) -> &[Obj] {
        &self.fields
    }

    /// Replaces a field, returning the previous reference for the caller to release.
    pub fn replace_field(&mut self, index: usize, value: Obj) -> Option<Obj> {
        self.fields.get_mut(index).map(|slot| std::mem::replace(slot, value))
    }

    pub fn push_field(&mut self, value: Obj) {
        self.fields.push(value);
    }

    pub fn estimate_size(&self) -> usize {
        (self.fields.len() + 1) * size_of::<Obj>()
    }

    pub fn take_children(&mut self, stack: &mut Vec<HeapId>) {
        stack.extend(self.base_value.take().map(Obj::into_raw));
        stack.extend(self.fields.drain(..).map(Obj::into_raw));
    }
}
