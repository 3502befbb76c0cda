//! Order in which the generic protocol consults operand slots.
//!
//! Slot functions cannot capture state, so the order is observed through a `RecordingTracer`.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use pyops::{
    BinaryOp, DialectKind, ExcType, Obj, RecordingTracer, RunResult, Runtime, RuntimeConfig, SlotResult, SlotSide,
    TypeId, TypeRegistry, TypeRegistryBuilder, TypeSpec,
};

fn decline(_rt: &mut Runtime, _a: &Obj, _b: &Obj) -> RunResult<SlotResult> {
    Ok(SlotResult::NotImplemented)
}

/// Handles only operands of one type.
fn same_type_only(rt: &mut Runtime, a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    if rt.type_of(a) == rt.type_of(b) {
        return Ok(SlotResult::Value(rt.new_ref(a)));
    }
    Ok(SlotResult::NotImplemented)
}

fn keep_left(rt: &mut Runtime, a: &Obj, _b: &Obj) -> RunResult<SlotResult> {
    Ok(SlotResult::Value(rt.new_ref(a)))
}

fn keep_right(rt: &mut Runtime, _a: &Obj, b: &Obj) -> RunResult<SlotResult> {
    Ok(SlotResult::Value(rt.new_ref(b)))
}

fn fail(_rt: &mut Runtime, _a: &Obj, _b: &Obj) -> RunResult<SlotResult> {
    Err(ExcType::ValueError.error("slot failed"))
}

fn runtime(builder: TypeRegistryBuilder) -> Runtime {
    let registry = Arc::new(builder.build());
    let config = RuntimeConfig::new(registry.dialect());
    Runtime::new(config, registry).unwrap().with_tracer(RecordingTracer::new())
}

fn slot_calls(rt: &Runtime) -> Vec<(String, SlotSide, bool)> {
    rt.tracer_as::<RecordingTracer>()
        .unwrap()
        .slot_calls()
        .into_iter()
        .map(|(owner, side, implemented)| (owner.to_owned(), side, implemented))
        .collect()
}

fn call(owner: &str, side: SlotSide, implemented: bool) -> (String, SlotSide, bool) {
    (owner.to_owned(), side, implemented)
}

fn release_all(rt: &mut Runtime, objs: impl IntoIterator<Item = Obj>) {
    for obj in objs {
        rt.release(obj);
    }
}

#[test]
fn left_then_right() {
    let mut builder = TypeRegistry::builder(DialectKind::Classic);
    let left = builder.define(TypeSpec::new("L").slot(BinaryOp::Add, decline)).unwrap();
    let right = builder.define(TypeSpec::new("R").slot(BinaryOp::Add, keep_right)).unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(left, None).unwrap();
    let b = rt.new_instance(right, None).unwrap();
    let result = rt.binary_operation(BinaryOp::Add, &a, &b).unwrap();
    assert!(result.is(&b));
    assert_eq!(
        slot_calls(&rt),
        vec![call("L", SlotSide::Left, false), call("R", SlotSide::Right, true)]
    );
    release_all(&mut rt, [a, b, result]);
}

#[test]
fn implemented_left_slot_ends_dispatch() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let left = builder.define(TypeSpec::new("L").slot(BinaryOp::Sub, keep_left)).unwrap();
    let right = builder.define(TypeSpec::new("R").slot(BinaryOp::Sub, keep_right)).unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(left, None).unwrap();
    let b = rt.new_instance(right, None).unwrap();
    let result = rt.binary_operation(BinaryOp::Sub, &a, &b).unwrap();
    assert!(result.is(&a));
    assert_eq!(slot_calls(&rt), vec![call("L", SlotSide::Left, true)]);
    release_all(&mut rt, [a, b, result]);
}

#[test]
fn subclass_overriding_slot_goes_first() {
    let mut builder = TypeRegistry::builder(DialectKind::Classic);
    let base = builder.define(TypeSpec::new("Base").slot(BinaryOp::Mult, keep_left)).unwrap();
    let derived = builder
        .define(TypeSpec::new("Derived").base(base).slot(BinaryOp::Mult, keep_right))
        .unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(base, None).unwrap();
    let b = rt.new_instance(derived, None).unwrap();
    let result = rt.binary_operation(BinaryOp::Mult, &a, &b).unwrap();
    assert!(result.is(&b));
    assert_eq!(slot_calls(&rt), vec![call("Derived", SlotSide::Right, true)]);
    release_all(&mut rt, [a, b, result]);
}

#[test]
fn declining_subclass_slot_is_not_retried() {
    let mut builder = TypeRegistry::builder(DialectKind::Classic);
    let base = builder.define(TypeSpec::new("Base").slot(BinaryOp::Mult, decline)).unwrap();
    let derived = builder
        .define(TypeSpec::new("Derived").base(base).slot(BinaryOp::Mult, keep_right))
        .unwrap();
    let other = builder
        .define(TypeSpec::new("Other").base(base).slot(BinaryOp::Mult, same_type_only))
        .unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(base, None).unwrap();
    let b = rt.new_instance(other, None).unwrap();
    let err = rt.binary_operation(BinaryOp::Mult, &a, &b).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: unsupported operand type(s) for *: 'Base' and 'Other'"
    );
    assert_eq!(
        slot_calls(&rt),
        vec![call("Other", SlotSide::Right, false), call("Base", SlotSide::Left, false)]
    );

    let c = rt.new_instance(derived, None).unwrap();
    let result = rt.binary_operation(BinaryOp::Mult, &c, &a).unwrap();
    assert!(result.is(&a));
    release_all(&mut rt, [a, b, c, result]);
}

#[test]
fn inherited_slot_is_called_once() {
    let mut builder = TypeRegistry::builder(DialectKind::Classic);
    let base = builder.define(TypeSpec::new("Base").slot(BinaryOp::BitOr, decline)).unwrap();
    let plain = builder.define(TypeSpec::new("Plain").base(base)).unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(base, None).unwrap();
    let b = rt.new_instance(plain, None).unwrap();
    let err = rt.binary_operation(BinaryOp::BitOr, &a, &b).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: unsupported operand type(s) for |: 'Base' and 'Plain'"
    );
    assert_eq!(slot_calls(&rt), vec![call("Base", SlotSide::Left, false)]);
    release_all(&mut rt, [a, b]);
}

#[test]
fn same_type_calls_one_slot() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let tp = builder.define(TypeSpec::new("T").slot(BinaryOp::Pow, decline)).unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(tp, None).unwrap();
    let b = rt.new_instance(tp, None).unwrap();
    let err = rt.binary_operation(BinaryOp::Pow, &a, &b).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: unsupported operand type(s) for ** or pow(): 'T' and 'T'"
    );
    assert_eq!(slot_calls(&rt), vec![call("T", SlotSide::Left, false)]);
    release_all(&mut rt, [a, b]);
}

#[test]
fn slot_error_stops_dispatch() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let left = builder.define(TypeSpec::new("L").slot(BinaryOp::Add, fail)).unwrap();
    let right = builder.define(TypeSpec::new("R").slot(BinaryOp::Add, keep_right)).unwrap();
    let mut rt = runtime(builder);

    let a = rt.new_instance(left, None).unwrap();
    let b = rt.new_instance(right, None).unwrap();
    let err = rt.binary_operation(BinaryOp::Add, &a, &b).unwrap_err();
    assert_eq!(err.to_string(), "ValueError: slot failed");
    assert!(slot_calls(&rt).is_empty());
    release_all(&mut rt, [a, b]);
}

#[test]
fn int_subclass_override_beats_builtin_left() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let my_int = builder
        .define(TypeSpec::new("MyInt").base(TypeId::INT).slot(BinaryOp::Add, keep_right))
        .unwrap();
    let mut rt = runtime(builder);

    let one = rt.new_int(1).unwrap();
    let five = rt.new_int(5).unwrap();
    let b = rt.new_instance(my_int, Some(five)).unwrap();
    let result = rt.binary_operation(BinaryOp::Add, &one, &b).unwrap();
    assert!(result.is(&b));
    assert_eq!(slot_calls(&rt), vec![call("MyInt", SlotSide::Right, true)]);
    release_all(&mut rt, [one, b, result]);
}

#[test]
fn int_subclass_without_override_uses_int_slot() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let my_int = builder.define(TypeSpec::new("MyInt").base(TypeId::INT)).unwrap();
    let mut rt = runtime(builder);

    let one = rt.new_int(1).unwrap();
    let five = rt.new_int(5).unwrap();
    let b = rt.new_instance(my_int, Some(five)).unwrap();
    let result = rt.binary_operation(BinaryOp::Add, &one, &b).unwrap();
    assert_eq!(rt.type_name(&result), "int");
    assert_eq!(rt.int_value(&result), Some(6));
    assert_eq!(slot_calls(&rt), vec![call("int", SlotSide::Left, true)]);
    release_all(&mut rt, [one, b, result]);
}

#[test]
fn float_with_int_subclass_on_the_right() {
    let mut builder = TypeRegistry::builder(DialectKind::Classic);
    let my_int = builder.define(TypeSpec::new("MyInt").base(TypeId::INT)).unwrap();
    let mut rt = runtime(builder);

    let x = rt.new_float(1.5).unwrap();
    let two = rt.new_int(2).unwrap();
    let b = rt.new_instance(my_int, Some(two)).unwrap();
    let result = rt.binary_operation(BinaryOp::Add, &x, &b).unwrap();
    assert_eq!(rt.float_value(&result), Some(3.5));
    assert_eq!(slot_calls(&rt), vec![call("float", SlotSide::Left, true)]);
    release_all(&mut rt, [x, b, result]);
}

#[test]
fn builtin_operands_take_the_fast_path() {
    let mut rt = Runtime::builtin(DialectKind::Current).with_tracer(RecordingTracer::new());
    let a = rt.new_int(2).unwrap();
    let b = rt.new_int(3).unwrap();
    let result = rt.binary_operation(BinaryOp::Mult, &a, &b).unwrap();
    assert_eq!(rt.int_value(&result), Some(6));
    assert!(slot_calls(&rt).is_empty());

    let via_slots = rt.binary_operation_via_slots(BinaryOp::Mult, &a, &b).unwrap();
    assert_eq!(rt.int_value(&via_slots), Some(6));
    assert_eq!(slot_calls(&rt), vec![call("int", SlotSide::Left, true)]);
    release_all(&mut rt, [a, b, result, via_slots]);
}
