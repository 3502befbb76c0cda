//! Value accessors and tracer management on the runtime.

use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use pyops::{
    BinaryOp, DialectKind, ExcType, ExceptionRecord, Obj, RecordingTracer, Runtime, RuntimeConfig, Traceback,
    TypeId, TypeRegistry, TypeSpec,
};

fn release_all(rt: &mut Runtime, objs: impl IntoIterator<Item = Obj>) {
    for obj in objs {
        rt.release(obj);
    }
}

#[test]
fn integer_accessors_cover_every_width() {
    let mut rt = Runtime::builtin(DialectKind::Legacy);
    assert_eq!(rt.dialect_kind(), DialectKind::Legacy);
    let big = rt.new_int(i64::MAX).unwrap();
    let sum = rt.binary_operation(BinaryOp::Add, &big, &big).unwrap();
    assert_eq!(rt.type_name(&sum), "long");
    assert_eq!(rt.int_value(&sum), None);
    assert_eq!(rt.bigint_value(&sum), Some(BigInt::from(i64::MAX) * 2));
    assert_eq!(rt.bigint_value(&big), Some(BigInt::from(i64::MAX)));

    let yes = rt.bool_obj(true);
    assert_eq!(rt.bool_value(&yes), Some(true));
    assert_eq!(rt.int_value(&yes), Some(1));
    assert_eq!(rt.bool_value(&big), None);
    release_all(&mut rt, [big, sum, yes]);
}

#[test]
fn container_accessors() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    let items = vec![rt.new_int(1).unwrap(), rt.new_str("a").unwrap()];
    let list = rt.new_list(items).unwrap();
    let doubled = rt.binary_operation(BinaryOp::Add, &list, &list).unwrap();
    assert_eq!(rt.sequence_items(&doubled).map(<[Obj]>::len), Some(4));
    assert!(rt.sequence_items(&doubled).unwrap()[2].is(&rt.sequence_items(&list).unwrap()[0]));

    let items = vec![rt.new_int(1).unwrap(), rt.new_int(2).unwrap()];
    let set = rt.new_set(items).unwrap();
    let one = rt.new_float(1.0).unwrap();
    let three = rt.new_int(3).unwrap();
    assert!(rt.set_contains(&set, &one).unwrap());
    assert!(!rt.set_contains(&set, &three).unwrap());
    assert_eq!(rt.set_contains(&set, &list).unwrap_err().exc_type(), ExcType::TypeError);
    assert_eq!(rt.set_contains(&list, &one).unwrap_err().exc_type(), ExcType::TypeError);
    release_all(&mut rt, [list, doubled, set, one, three]);
}

#[test]
fn builtin_subclass_instances_wrap_a_value() {
    let mut builder = TypeRegistry::builder(DialectKind::Current);
    let my_int = builder.define(TypeSpec::new("MyInt").base(TypeId::INT)).unwrap();
    let mut rt = Runtime::new(RuntimeConfig::new(DialectKind::Current), builder.build()).unwrap();

    let seven = rt.new_int(7).unwrap();
    let wrapped = rt.new_instance(my_int, Some(seven)).unwrap();
    assert_eq!(rt.type_name(&wrapped), "MyInt");
    assert_eq!(rt.instance_base_value(&wrapped).and_then(|v| rt.int_value(v)), Some(7));
    assert_eq!(rt.int_value(&wrapped), Some(7));

    let two = rt.new_int(2).unwrap();
    let product = rt.binary_operation(BinaryOp::Mult, &wrapped, &two).unwrap();
    assert_eq!(rt.type_name(&product), "int");
    assert_eq!(rt.int_value(&product), Some(14));
    assert!(rt.instance_base_value(&product).is_none());
    release_all(&mut rt, [wrapped, two, product]);
}

#[test]
fn tracer_can_be_swapped_and_cleared() {
    let mut rt = Runtime::builtin(DialectKind::Classic);
    assert!(rt.tracer_as::<RecordingTracer>().is_none());
    rt.set_tracer(RecordingTracer::new());

    let a = rt.new_int(1).unwrap();
    let sum = rt.binary_operation(BinaryOp::Add, &a, &a).unwrap();
    assert!(!rt.tracer_as::<RecordingTracer>().unwrap().events().is_empty());

    rt.tracer_as_mut::<RecordingTracer>().unwrap().clear();
    assert!(rt.tracer_as::<RecordingTracer>().unwrap().events().is_empty());
    release_all(&mut rt, [a, sum]);
}

#[test]
fn record_traceback_moves_into_instance() {
    let mut traceback = Traceback::new();
    traceback.push("outer", 3);
    traceback.push("inner", 9);
    let record = ExceptionRecord::new_msg(ExcType::ValueError, "bad").with_traceback(traceback);
    assert_eq!(record.traceback().map(|tb| tb.frames().len()), Some(2));

    let instance = record.into_instance();
    assert_eq!(instance.exc_type(), ExcType::ValueError);
    assert_eq!(instance.args(), ["bad".to_owned()]);
    let frames = instance.traceback().unwrap().frames();
    assert_eq!(frames[1].function, "inner");
    assert_eq!(frames[1].line, 9);
}

#[test]
fn float_repr_uses_shortest_round_trip_digits() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    for (value, text) in [
        (1e16, "1e+16"),
        (1e20, "1e+20"),
        (1e-7, "1e-07"),
        (5e-324, "5e-324"),
        (1e15, "1000000000000000.0"),
        (0.1, "0.1"),
    ] {
        let obj = rt.new_float(value).unwrap();
        assert_eq!(rt.repr(&obj), text);
        rt.release(obj);
    }

    let items = vec![rt.new_float(1e-300).unwrap(), rt.new_float(-0.0).unwrap()];
    let list = rt.new_list(items).unwrap();
    assert_eq!(rt.repr(&list), "[1e-300, -0.0]");
    let big = rt.new_float(1e300).unwrap();
    let product = rt.binary_operation(BinaryOp::Mult, &big, &big).unwrap();
    assert_eq!(rt.repr(&product), "inf");
    release_all(&mut rt, [list, big, product]);
}
