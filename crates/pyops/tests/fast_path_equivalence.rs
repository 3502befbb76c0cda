//! The native kernels must be invisible: for exact builtin operands, `binary_operation` gives
//! the same result (or the same error) as running the slot protocol, in every dialect.

use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use pyops::{BinaryOp, DialectKind, Obj, OperationForm, RecordingTracer, RunResult, Runtime, TraceEvent, entry};
use strum::IntoEnumIterator;

const DIALECTS: [DialectKind; 3] = [DialectKind::Legacy, DialectKind::Classic, DialectKind::Current];

fn numbers(rt: &mut Runtime) -> Vec<Obj> {
    let mut objs = Vec::new();
    for value in [0, 1, 3, -7, 64, i64::MAX, i64::MIN] {
        objs.push(rt.new_int(value).unwrap());
    }
    for value in [BigInt::from(5), BigInt::from(1) << 70, -(BigInt::from(1) << 70u32)] {
        objs.push(rt.new_int_from_big(value).unwrap());
    }
    for value in [0.0, -0.0, 0.5, -2.5, 3.0, 1e308, f64::INFINITY, f64::NAN] {
        objs.push(rt.new_float(value).unwrap());
    }
    objs.push(rt.bool_obj(true));
    objs.push(rt.bool_obj(false));
    objs
}

fn containers(rt: &mut Runtime) -> Vec<Obj> {
    let mut objs = vec![
        rt.new_str("ab").unwrap(),
        rt.new_str("").unwrap(),
        rt.new_int(0).unwrap(),
        rt.new_int(2).unwrap(),
        rt.new_int(-1).unwrap(),
        rt.new_int_from_big(BigInt::from(1) << 70).unwrap(),
        rt.new_float(1.5).unwrap(),
        rt.bool_obj(true),
    ];
    let items = vec![rt.new_int(1).unwrap()];
    objs.push(rt.new_list(items).unwrap());
    let items = vec![rt.new_int(1).unwrap(), rt.new_str("x").unwrap()];
    objs.push(rt.new_tuple(items).unwrap());
    let items = vec![rt.new_int(1).unwrap(), rt.new_int(2).unwrap()];
    objs.push(rt.new_set(items).unwrap());
    let items = vec![rt.new_int(2).unwrap(), rt.new_int(3).unwrap()];
    objs.push(rt.new_frozenset(items).unwrap());
    objs
}

/// Renders an outcome and releases the result.
fn render(rt: &mut Runtime, result: RunResult<Obj>) -> String {
    match result {
        Ok(obj) => {
            let text = format!("{}:{}", rt.type_name(&obj), rt.repr(&obj));
            rt.release(obj);
            text
        }
        Err(err) => format!("error {err}"),
    }
}

/// Shifting by a huge count would allocate the result; those pairs are covered elsewhere.
fn too_expensive(rt: &Runtime, op: BinaryOp, b: &Obj) -> bool {
    op == BinaryOp::LShift && rt.int_value(b).is_some_and(|count| count > 64)
}

fn compare_all(kind: DialectKind, operands: fn(&mut Runtime) -> Vec<Obj>) {
    let mut rt = Runtime::builtin(kind);
    let objs = operands(&mut rt);
    for op in BinaryOp::iter() {
        for a in &objs {
            for b in &objs {
                if too_expensive(&rt, op, b) {
                    continue;
                }
                let context = format!("{kind}: {} {op} {}", rt.repr(a), rt.repr(b));

                let fast = rt.binary_operation(op, a, b);
                let fast_truth = match &fast {
                    Ok(obj) => Some(rt.is_true(obj).unwrap()),
                    Err(_) => None,
                };
                let fast = render(&mut rt, fast);
                let slow = rt.binary_operation_via_slots(op, a, b);
                let slow = render(&mut rt, slow);
                assert_eq!(fast, slow, "{context}");

                let truth = rt.binary_operation_bool(op, a, b).ok();
                assert_eq!(truth, fast_truth, "{context}");
            }
        }
    }
    for obj in objs {
        rt.release(obj);
    }
}

#[test]
fn numeric_kernels_match_slots() {
    for kind in DIALECTS {
        compare_all(kind, numbers);
    }
}

#[test]
fn container_kernels_match_slots() {
    for kind in DIALECTS {
        compare_all(kind, containers);
    }
}

#[test]
fn legacy_small_long_stays_long() {
    let mut rt = Runtime::builtin(DialectKind::Legacy);
    let five = rt.new_int_from_big(BigInt::from(5)).unwrap();
    let one = rt.new_int(1).unwrap();
    let fast = rt.binary_operation(BinaryOp::Sub, &five, &one);
    assert_eq!(render(&mut rt, fast), "long:4L");
    let slow = rt.binary_operation_via_slots(BinaryOp::Sub, &one, &five);
    assert_eq!(render(&mut rt, slow), "long:-4L");
    rt.release(five);
    rt.release(one);
}

type Entry = fn(&mut Runtime, &Obj, &Obj) -> RunResult<Obj>;
type TruthEntry = fn(&mut Runtime, &Obj, &Obj) -> RunResult<bool>;

/// The binary and truth entry points of the listed operators for one operand pair.
macro_rules! pair_entries_for {
    ($l:ident, $r:ident; $($name:ident => $op:ident),* $(,)?) => {
        paste::paste! {
            vec![
                $(
                    (
                        BinaryOp::$op,
                        entry::[<binary_ $name _ $l _ $r>] as Entry,
                        entry::[<binary_ $name _nbool_ $l _ $r>] as TruthEntry,
                    ),
                )*
            ]
        }
    };
}

/// Every operator's entry points for one operand pair.
macro_rules! all_entries {
    ($l:ident, $r:ident) => {
        pair_entries_for!($l, $r; add => Add, sub => Sub, mult => Mult, matmult => MatMult, truediv => TrueDiv,
            floordiv => FloorDiv, div => OldDiv, mod => Mod, pow => Pow, lshift => LShift, rshift => RShift,
            and => BitAnd, or => BitOr, xor => BitXor, divmod => DivMod)
    };
}

fn ints(rt: &mut Runtime) -> Vec<Obj> {
    [0, 1, 3, -7, 64, i64::MAX, i64::MIN]
        .into_iter()
        .map(|value| rt.new_int(value).unwrap())
        .collect()
}

/// Values of the arbitrary-precision integer type: `long` in the legacy dialect, any `int`
/// otherwise.
fn longs(rt: &mut Runtime) -> Vec<Obj> {
    [BigInt::from(0), BigInt::from(5), BigInt::from(-3), BigInt::from(1) << 70, -(BigInt::from(1) << 70u32)]
        .into_iter()
        .map(|value| rt.new_int_from_big(value).unwrap())
        .collect()
}

fn floats(rt: &mut Runtime) -> Vec<Obj> {
    [0.0, -0.0, 0.5, -2.5, 3.0, 1e308, f64::INFINITY, f64::NAN]
        .into_iter()
        .map(|value| rt.new_float(value).unwrap())
        .collect()
}

fn huge_shift(rt: &Runtime, op: BinaryOp, b: &Obj) -> bool {
    op == BinaryOp::LShift && rt.bigint_value(b).is_some_and(|count| count > BigInt::from(64))
}

fn compare_entries(
    kind: DialectKind,
    entries: &[(BinaryOp, Entry, TruthEntry)],
    left: fn(&mut Runtime) -> Vec<Obj>,
    right: fn(&mut Runtime) -> Vec<Obj>,
) {
    let mut rt = Runtime::builtin(kind);
    let lefts = left(&mut rt);
    let rights = right(&mut rt);
    for &(op, binary, truth) in entries {
        for a in &lefts {
            for b in &rights {
                if huge_shift(&rt, op, b) {
                    continue;
                }
                let context = format!("{kind}: {} {op} {}", rt.repr(a), rt.repr(b));

                let specialized = binary(&mut rt, a, b);
                let specialized_truth = match &specialized {
                    Ok(obj) => Some(rt.is_true(obj).unwrap()),
                    Err(_) => None,
                };
                let specialized = render(&mut rt, specialized);
                let slow = rt.binary_operation_via_slots(op, a, b);
                let slow = render(&mut rt, slow);
                assert_eq!(specialized, slow, "{context}");
                assert_eq!(truth(&mut rt, a, b).ok(), specialized_truth, "{context}");
            }
        }
    }
    for obj in lefts.into_iter().chain(rights) {
        rt.release(obj);
    }
}

#[test]
fn specialized_numeric_entries_match_slots() {
    for kind in DIALECTS {
        compare_entries(kind, &all_entries!(int, int), ints, ints);
        compare_entries(kind, &all_entries!(long, long), longs, longs);
        compare_entries(kind, &all_entries!(float, float), floats, floats);
        compare_entries(kind, &all_entries!(float, int), floats, ints);
        compare_entries(kind, &all_entries!(int, float), ints, floats);
    }
}

#[test]
fn specialized_entry_takes_the_kernel() {
    let mut rt = Runtime::builtin(DialectKind::Current).with_tracer(RecordingTracer::new());
    let a = rt.new_float(1.5).unwrap();
    let b = rt.new_int(4).unwrap();
    let product = entry::binary_mult_float_int(&mut rt, &a, &b).unwrap();
    assert_eq!(rt.float_value(&product), Some(6.0));
    assert!(entry::binary_sub_nbool_float_int(&mut rt, &a, &b).unwrap());

    let events = rt.tracer_as::<RecordingTracer>().unwrap().events();
    let fast: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::FastPath { op, form } => Some((*op, *form)),
            _ => None,
        })
        .collect();
    assert_eq!(
        fast,
        [(BinaryOp::Mult, OperationForm::Binary), (BinaryOp::Sub, OperationForm::Bool)]
    );
    assert!(!events.iter().any(|event| matches!(event, TraceEvent::SlotCall { .. })));
    for obj in [a, b, product] {
        rt.release(obj);
    }
}
