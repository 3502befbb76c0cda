//! The runtime context every operator call runs against.

use std::{borrow::Borrow, sync::Arc};

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::{
    config::{ConfigError, RuntimeConfig},
    dialect::{Dialect, DialectKind},
    dispatch::native::CachedFloat,
    exception_private::{ExcType, RunError, RunResult},
    exception_state::ThreadState,
    heap::{ContainsHeap, DropWithHeap, Heap, HeapData, HeapId, HeapStats},
    object::Obj,
    tracer::{DispatchTracer, NoopTracer},
    types::{Instance, LongInt, SetStorage, TypeId, TypeRegistry, float::float_repr},
};

/// Objects the runtime preallocates and hands out new references to.
#[derive(Debug, Clone, Copy)]
struct Singletons {
    none: HeapId,
    true_: HeapId,
    false_: HeapId,
    float_zero: HeapId,
    float_one: HeapId,
    float_minus_one: HeapId,
}

impl Singletons {
    fn allocate(heap: &mut Heap) -> Result<Self, ConfigError> {
        Ok(Self {
            none: heap.allocate(HeapData::None)?,
            true_: heap.allocate(HeapData::Bool(true))?,
            false_: heap.allocate(HeapData::Bool(false))?,
            float_zero: heap.allocate(HeapData::Float(0.0))?,
            float_one: heap.allocate(HeapData::Float(1.0))?,
            float_minus_one: heap.allocate(HeapData::Float(-1.0))?,
        })
    }

    fn contains(self, id: HeapId) -> bool {
        [
            self.none,
            self.true_,
            self.false_,
            self.float_zero,
            self.float_one,
            self.float_minus_one,
        ]
        .contains(&id)
    }
}

/// Heap, type registry, dialect, exception state and tracer of one thread of compiled code.
///
/// Operators borrow their operands and return new references; the caller releases every
/// reference it owns with [`Runtime::release`].
///
/// ```
/// use pyops::{BinaryOp, DialectKind, Runtime};
///
/// let mut rt = Runtime::builtin(DialectKind::Current);
/// let a = rt.new_int(7).unwrap();
/// let b = rt.new_int(2).unwrap();
/// let q = rt.binary_operation(BinaryOp::TrueDiv, &a, &b).unwrap();
/// assert_eq!(rt.float_value(&q), Some(3.5));
/// for obj in [a, b, q] {
///     rt.release(obj);
/// }
/// ```
#[derive(Debug)]
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) types: Arc<TypeRegistry>,
    pub(crate) dialect: &'static dyn Dialect,
    singletons: Singletons,
    pub(crate) thread_state: ThreadState,
    pub(crate) tracer: Box<dyn DispatchTracer>,
}

impl Runtime {
    /// Creates a runtime dispatching over `registry`, which must have been built for the
    /// configured dialect.
    pub fn new(config: RuntimeConfig, registry: impl Into<Arc<TypeRegistry>>) -> Result<Self, ConfigError> {
        let types = registry.into();
        if types.dialect() != config.dialect {
            return Err(ConfigError::DialectMismatch {
                config: config.dialect,
                registry: types.dialect(),
            });
        }
        let mut heap = Heap::new(config.heap_capacity, config.limits);
        let singletons = Singletons::allocate(&mut heap)?;
        Ok(Self {
            heap,
            types,
            dialect: config.dialect.dialect(),
            singletons,
            thread_state: ThreadState::default(),
            tracer: Box::new(NoopTracer),
        })
    }

    /// A runtime with only the builtin types and no resource limits.
    ///
    /// # Panics
    /// Never in practice: an unlimited heap cannot refuse the singleton allocations.
    #[must_use]
    pub fn builtin(dialect: DialectKind) -> Self {
        Self::new(RuntimeConfig::new(dialect), TypeRegistry::with_builtins(dialect))
            .expect("unlimited runtime construction cannot fail")
    }

    /// Installs a tracer, replacing the current one.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl DispatchTracer) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn set_tracer(&mut self, tracer: impl DispatchTracer) {
        self.tracer = Box::new(tracer);
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    #[must_use]
    pub fn dialect_kind(&self) -> DialectKind {
        self.dialect.kind()
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    // ------------------------------------------------------------------
    // object construction
    // ------------------------------------------------------------------

    pub(crate) fn alloc(&mut self, data: HeapData) -> RunResult<Obj> {
        Ok(Obj::from_raw(self.heap.allocate(data)?))
    }

    fn singleton(&self, id: HeapId) -> Obj {
        self.heap.inc_ref(id);
        Obj::from_raw(id)
    }

    /// A new reference to `None`.
    #[must_use]
    pub fn none(&self) -> Obj {
        self.singleton(self.singletons.none)
    }

    /// A new reference to `True` or `False`.
    #[must_use]
    pub fn bool_obj(&self, value: bool) -> Obj {
        self.singleton(if value {
            self.singletons.true_
        } else {
            self.singletons.false_
        })
    }

    pub(crate) fn cached_float(&self, which: CachedFloat) -> Obj {
        self.singleton(match which {
            CachedFloat::Zero => self.singletons.float_zero,
            CachedFloat::One => self.singletons.float_one,
            CachedFloat::MinusOne => self.singletons.float_minus_one,
        })
    }

    pub(crate) fn is_singleton(&self, obj: &Obj) -> bool {
        self.singletons.contains(obj.id())
    }

    pub fn new_int(&mut self, value: i64) -> RunResult<Obj> {
        self.alloc(HeapData::Int(value))
    }

    /// An integer from an arbitrary-precision value.
    ///
    /// In dialects with a unified `int` the value is stored fixed-width when it fits; in the
    /// legacy dialect the result is always a `long`.
    pub fn new_int_from_big(&mut self, value: BigInt) -> RunResult<Obj> {
        if !self.dialect.has_distinct_long()
            && let Some(small) = value.to_i64()
        {
            return self.new_int(small);
        }
        self.alloc(HeapData::Long(LongInt::new(value)))
    }

    pub fn new_float(&mut self, value: f64) -> RunResult<Obj> {
        self.alloc(HeapData::Float(value))
    }

    pub fn new_str(&mut self, value: impl Into<String>) -> RunResult<Obj> {
        self.alloc(HeapData::Str(value.into()))
    }

    /// A list taking ownership of `items`.
    pub fn new_list(&mut self, items: Vec<Obj>) -> RunResult<Obj> {
        self.alloc(HeapData::List(items))
    }

    /// A tuple taking ownership of `items`.
    pub fn new_tuple(&mut self, items: Vec<Obj>) -> RunResult<Obj> {
        self.alloc(HeapData::Tuple(items))
    }

    /// A set of `items`; duplicates are released.
    pub fn new_set(&mut self, items: Vec<Obj>) -> RunResult<Obj> {
        let storage = SetStorage::from_items(self, items)?;
        self.alloc(HeapData::Set(storage))
    }

    pub fn new_frozenset(&mut self, items: Vec<Obj>) -> RunResult<Obj> {
        let storage = SetStorage::from_items(self, items)?;
        self.alloc(HeapData::FrozenSet(storage))
    }

    /// An instance of the user type `class`.
    ///
    /// Types deriving from a builtin need a `base_value` of that builtin; other types must
    /// not be given one. Ownership of `base_value` passes to the instance, or is released if
    /// the instance cannot be created.
    pub fn new_instance(&mut self, class: TypeId, base_value: Option<Obj>) -> RunResult<Obj> {
        if let Err(err) = self.check_instance(class, base_value.as_ref()) {
            base_value.drop_with_heap(&mut self.heap);
            return Err(err);
        }
        self.alloc(HeapData::Instance(Instance::new(class, base_value, Vec::new())))
    }

    fn check_instance(&self, class: TypeId, base_value: Option<&Obj>) -> RunResult<()> {
        if class.index() >= self.types.len() {
            return Err(RunError::internal("instance of a type outside the registry"));
        }
        let tp = self.types.get(class);
        if tp.is_builtin() {
            return Err(ExcType::type_error(format!(
                "instances of builtin type '{}' are created by their own constructors",
                tp.name()
            )));
        }
        match (tp.builtin_base(), base_value) {
            (None, None) => Ok(()),
            (Some(base), Some(value)) if self.type_of(value) == base => Ok(()),
            (Some(base), Some(value)) if base == TypeId::INT && self.type_of(value) == self.types.big_int_type() => {
                Ok(())
            }
            (Some(base), _) => Err(ExcType::type_error(format!(
                "'{}' instances need a '{}' base value",
                tp.name(),
                self.types.name(base)
            ))),
            (None, Some(_)) => Err(ExcType::type_error(format!(
                "'{}' does not derive from a builtin type",
                tp.name()
            ))),
        }
    }

    /// Stores `value` in field `index` of an instance, appending when `index` is one past the
    /// end. The previous field value, if any, is released.
    pub fn set_instance_field(&mut self, obj: &Obj, index: usize, value: Obj) -> RunResult<()> {
        let replaced = match self.heap.get_mut(obj.id()) {
            HeapData::Instance(inst) if index < inst.fields().len() => inst.replace_field(index, value),
            HeapData::Instance(inst) if index == inst.fields().len() => {
                inst.push_field(value);
                None
            }
            _ => {
                value.drop_with_heap(&mut self.heap);
                return Err(ExcType::AttributeError.error(format!(
                    "'{}' object has no field {index}",
                    self.type_name(obj)
                )));
            }
        };
        replaced.drop_with_heap(&mut self.heap);
        self.heap.refresh_size(obj.id())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // reference management
    // ------------------------------------------------------------------

    /// Takes a new reference to `obj`.
    #[must_use]
    pub fn new_ref(&self, obj: &Obj) -> Obj {
        obj.clone_with_heap(&self.heap)
    }

    /// Gives back a reference.
    pub fn release(&mut self, obj: Obj) {
        obj.drop_with_heap(&mut self.heap);
    }

    #[must_use]
    pub fn refcount(&self, obj: &Obj) -> usize {
        self.heap.get_refcount(obj.id())
    }

    #[must_use]
    pub fn is_live(&self, id: HeapId) -> bool {
        self.heap.is_live(id)
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub(crate) fn check_large_result(&self, estimated_bytes: Option<usize>) -> RunResult<()> {
        self.num_ctx().check_large_result(estimated_bytes)
    }

    // ------------------------------------------------------------------
    // inspection
    // ------------------------------------------------------------------

    #[must_use]
    pub fn type_of(&self, obj: &Obj) -> TypeId {
        match self.heap.get(obj.id()) {
            HeapData::None => TypeId::NONE,
            HeapData::Bool(_) => TypeId::BOOL,
            HeapData::Int(_) => TypeId::INT,
            HeapData::Long(_) => self.types.big_int_type(),
            HeapData::Float(_) => TypeId::FLOAT,
            HeapData::Str(_) => TypeId::STR,
            HeapData::List(_) => TypeId::LIST,
            HeapData::Tuple(_) => TypeId::TUPLE,
            HeapData::Set(_) => TypeId::SET,
            HeapData::FrozenSet(_) => TypeId::FROZENSET,
            HeapData::Instance(inst) => inst.class(),
        }
    }

    /// The type name used in error messages.
    #[must_use]
    pub fn type_name(&self, obj: &Obj) -> &str {
        self.types.name(self.type_of(obj))
    }

    /// The heap slot holding the builtin value of `obj`: the object itself, or the base value
    /// of an instance of a builtin subclass.
    pub(crate) fn payload_id(&self, obj: &Obj) -> HeapId {
        match self.heap.get(obj.id()) {
            HeapData::Instance(inst) => inst.base_value().map_or(obj.id(), Obj::id),
            _ => obj.id(),
        }
    }

    pub(crate) fn payload(&self, obj: &Obj) -> &HeapData {
        self.heap.get(self.payload_id(obj))
    }

    /// The value of an integer (or `bool`) that fits in an `i64`.
    #[must_use]
    pub fn int_value(&self, obj: &Obj) -> Option<i64> {
        match self.payload(obj) {
            HeapData::Bool(b) => Some(i64::from(*b)),
            HeapData::Int(i) => Some(*i),
            HeapData::Long(li) => li.inner().to_i64(),
            _ => None,
        }
    }

    /// The value of any integer.
    #[must_use]
    pub fn bigint_value(&self, obj: &Obj) -> Option<BigInt> {
        match self.payload(obj) {
            HeapData::Long(li) => Some(li.inner().clone()),
            _ => self.int_value(obj).map(BigInt::from),
        }
    }

    #[must_use]
    pub fn float_value(&self, obj: &Obj) -> Option<f64> {
        match self.payload(obj) {
            HeapData::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_value(&self, obj: &Obj) -> Option<bool> {
        match self.heap.get(obj.id()) {
            HeapData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn str_value(&self, obj: &Obj) -> Option<&str> {
        match self.payload(obj) {
            HeapData::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a `list` or `tuple`.
    #[must_use]
    pub fn sequence_items(&self, obj: &Obj) -> Option<&[Obj]> {
        match self.payload(obj) {
            HeapData::List(items) | HeapData::Tuple(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn set_len(&self, obj: &Obj) -> Option<usize> {
        match self.payload(obj) {
            HeapData::Set(storage) | HeapData::FrozenSet(storage) => Some(storage.len()),
            _ => None,
        }
    }

    /// Whether a `set` or `frozenset` contains a value equal to `item`.
    pub fn set_contains(&self, set: &Obj, item: &Obj) -> RunResult<bool> {
        let key = crate::types::set::SetKey::of(self, item)?;
        match self.payload(set) {
            HeapData::Set(storage) | HeapData::FrozenSet(storage) => Ok(storage.contains(&key)),
            _ => Err(ExcType::type_error(format!(
                "argument of type '{}' is not a set",
                self.type_name(set)
            ))),
        }
    }

    #[must_use]
    pub fn instance_fields(&self, obj: &Obj) -> Option<&[Obj]> {
        match self.heap.get(obj.id()) {
            HeapData::Instance(inst) => Some(inst.fields()),
            _ => None,
        }
    }

    /// The builtin value an instance of a builtin subclass wraps.
    #[must_use]
    pub fn instance_base_value(&self, obj: &Obj) -> Option<&Obj> {
        match self.heap.get(obj.id()) {
            HeapData::Instance(inst) => inst.base_value(),
            _ => None,
        }
    }

    /// Truth value: the type's truth slot if it has one, otherwise the builtin rules.
    pub fn is_true(&mut self, obj: &Obj) -> RunResult<bool> {
        if let Some(truth) = self.types.truth_slot(self.type_of(obj)) {
            return truth(self, obj);
        }
        Ok(match self.payload(obj) {
            HeapData::None => false,
            HeapData::Bool(b) => *b,
            HeapData::Int(i) => *i != 0,
            HeapData::Long(li) => !li.inner().is_zero(),
            HeapData::Float(f) => *f != 0.0,
            HeapData::Str(s) => !s.is_empty(),
            HeapData::List(items) | HeapData::Tuple(items) => !items.is_empty(),
            HeapData::Set(storage) | HeapData::FrozenSet(storage) => !storage.is_empty(),
            HeapData::Instance(_) => true,
        })
    }

    /// A short `repr()`-like rendering, for diagnostics and tests.
    #[must_use]
    pub fn repr(&self, obj: &Obj) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, obj.id());
        out
    }

    fn write_repr(&self, out: &mut String, id: HeapId) {
        match self.heap.get(id) {
            HeapData::None => out.push_str("None"),
            HeapData::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
            HeapData::Int(i) => out.push_str(&i.to_string()),
            HeapData::Long(li) => {
                out.push_str(&li.to_string());
                if self.dialect.has_distinct_long() {
                    out.push('L');
                }
            }
            HeapData::Float(f) => out.push_str(&float_repr(*f)),
            HeapData::Str(s) => {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            }
            HeapData::List(items) => self.write_items(out, "[", items, "]"),
            HeapData::Tuple(items) if items.len() == 1 => self.write_items(out, "(", items, ",)"),
            HeapData::Tuple(items) => self.write_items(out, "(", items, ")"),
            HeapData::Set(storage) if storage.is_empty() => out.push_str("set()"),
            HeapData::Set(storage) => self.write_items(out, "{", &storage.values().collect::<Vec<_>>(), "}"),
            HeapData::FrozenSet(storage) => {
                out.push_str("frozenset(");
                if !storage.is_empty() {
                    self.write_items(out, "{", &storage.values().collect::<Vec<_>>(), "}");
                }
                out.push(')');
            }
            HeapData::Instance(inst) => {
                out.push('<');
                out.push_str(self.types.name(inst.class()));
                out.push_str(" object>");
            }
        }
    }

    fn write_items<T: Borrow<Obj>>(&self, out: &mut String, open: &str, items: &[T], close: &str) {
        out.push_str(open);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_repr(out, item.borrow().id());
        }
        out.push_str(close);
    }
}

impl ContainsHeap for Runtime {
    #[inline]
    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_shared() {
        let mut rt = Runtime::builtin(DialectKind::Current);
        let a = rt.none();
        let b = rt.none();
        assert!(a.is(&b));
        assert_eq!(rt.refcount(&a), 3);
        rt.release(a);
        rt.release(b);
    }

    #[test]
    fn big_values_normalize_outside_legacy() {
        let mut rt = Runtime::builtin(DialectKind::Current);
        let small = rt.new_int_from_big(BigInt::from(5)).unwrap();
        assert_eq!(rt.type_of(&small), TypeId::INT);
        assert!(matches!(rt.heap.get(small.id()), HeapData::Int(5)));
        rt.release(small);

        let mut legacy = Runtime::builtin(DialectKind::Legacy);
        let long = legacy.new_int_from_big(BigInt::from(5)).unwrap();
        assert_eq!(legacy.type_name(&long), "long");
        assert_eq!(legacy.repr(&long), "5L");
        legacy.release(long);
    }

    #[test]
    fn allocation_limit_below_singletons_is_a_config_error() {
        let config = RuntimeConfig::new(DialectKind::Current)
            .with_limits(crate::ResourceLimits::new().max_allocations(3));
        let err = Runtime::new(config, TypeRegistry::with_builtins(DialectKind::Current)).unwrap_err();
        assert!(matches!(err, ConfigError::Resource(_)));
    }

    #[test]
    fn repr_formats() {
        let mut rt = Runtime::builtin(DialectKind::Current);
        let one = rt.new_int(1).unwrap();
        let half = rt.new_float(2.0).unwrap();
        let text = rt.new_str("x").unwrap();
        let tuple = rt.new_tuple(vec![one, half, text]).unwrap();
        assert_eq!(rt.repr(&tuple), "(1, 2.0, 'x')");
        rt.release(tuple);
    }
}
