//! Pending and handled exception state: fetch/restore, chaining and bare `raise`.

use pretty_assertions::assert_eq;
use pyops::{BinaryOp, DialectKind, ExcType, ExcValue, ExceptionInstance, ExceptionRecord, RunError, Runtime};

fn zero_division(rt: &mut Runtime) -> RunError {
    let one = rt.new_int(1).unwrap();
    let zero = rt.new_int(0).unwrap();
    let err = rt.binary_operation(BinaryOp::FloorDiv, &one, &zero).unwrap_err();
    rt.release(one);
    rt.release(zero);
    err
}

#[test]
fn fetch_clears_and_restore_puts_back() {
    let mut rt = Runtime::builtin(DialectKind::Classic);
    assert!(!rt.has_pending());
    let err = zero_division(&mut rt);
    rt.set_pending(err);
    assert!(rt.has_pending());

    let record = rt.fetch_pending().unwrap();
    assert!(!rt.has_pending());
    assert_eq!(record.exc_type(), ExcType::ZeroDivisionError);
    assert_eq!(record.message().as_deref(), Some("integer division or modulo by zero"));

    rt.restore_pending(Some(record.clone()));
    assert_eq!(rt.pending(), Some(&record));
    rt.restore_pending(None);
    assert!(!rt.has_pending());
}

#[test]
fn setting_replaces_the_pending_exception() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    rt.set_pending(ExcType::KeyError.error("first"));
    rt.set_pending(ExcType::ValueError.error("second"));
    let record = rt.fetch_pending().unwrap();
    assert_eq!(record.to_string(), "ValueError: second");
    assert!(rt.fetch_pending().is_none());
}

#[test]
fn normalization_is_eager_only_in_current() {
    for (kind, eager) in [
        (DialectKind::Legacy, false),
        (DialectKind::Classic, false),
        (DialectKind::Current, true),
    ] {
        let mut rt = Runtime::builtin(kind);
        let err = zero_division(&mut rt);
        rt.set_pending(err);
        assert_eq!(rt.pending().unwrap().is_normalized(), eager, "{kind}");
        let instance = rt.normalize_pending().unwrap();
        assert_eq!(instance.exc_type(), ExcType::ZeroDivisionError);
        assert!(rt.pending().unwrap().is_normalized());
    }
}

#[test]
fn empty_value_normalizes_to_no_arguments() {
    let mut record = ExceptionRecord::empty(ExcType::StopIteration);
    assert_eq!(record.value(), &ExcValue::Empty);
    record.normalize();
    assert!(record.instance().unwrap().args().is_empty());
    assert_eq!(record.to_string(), "StopIteration");
}

#[test]
fn internal_errors_become_runtime_errors() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    let a = rt.new_int(1).unwrap();
    let err = rt.binary_operation(BinaryOp::OldDiv, &a, &a).unwrap_err();
    rt.release(a);
    assert!(!err.is_catchable());
    rt.set_pending(err);
    let record = rt.fetch_pending().unwrap();
    assert!(record.matches(ExcType::Exception));
    assert_eq!(record.exc_type(), ExcType::RuntimeError);
}

#[test]
fn bare_raise_without_active_exception() {
    let legacy = Runtime::builtin(DialectKind::Legacy);
    assert_eq!(
        legacy.reraise().to_string(),
        "TypeError: exceptions must be old-style classes or derived from BaseException, not NoneType"
    );
    for kind in [DialectKind::Classic, DialectKind::Current] {
        let rt = Runtime::builtin(kind);
        assert_eq!(rt.reraise().to_string(), "RuntimeError: No active exception to reraise");
    }
}

#[test]
fn bare_raise_reraises_the_handled_exception() {
    let mut rt = Runtime::builtin(DialectKind::Classic);
    let mut caught = ExceptionRecord::new_msg(ExcType::KeyError, "missing");
    caught.push_frame("lookup", 12);
    rt.push_handled(caught);

    let err = rt.reraise();
    let record = err.record().unwrap();
    assert_eq!(record.exc_type(), ExcType::KeyError);
    assert_eq!(record.traceback().unwrap().frames()[0].line, 12);

    rt.pop_handled();
    assert!(rt.active_exception().is_none());
}

#[test]
fn raising_inside_a_handler_chains_the_context() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    let caught = zero_division(&mut rt).into_record();
    rt.push_handled(caught);

    let err = rt.raise_in_context(ExcType::ValueError.error("while handling"));
    let instance = err.record().unwrap().instance().unwrap();
    let context = instance.context().unwrap();
    assert_eq!(context.exc_type(), ExcType::ZeroDivisionError);
    assert!(!instance.suppress_context());
    rt.pop_handled();

    let plain = rt.raise_in_context(ExcType::ValueError.error("outside"));
    assert!(plain.record().unwrap().instance().is_none());
}

#[test]
fn legacy_does_not_chain() {
    let mut rt = Runtime::builtin(DialectKind::Legacy);
    rt.push_handled(ExceptionRecord::new_msg(ExcType::KeyError, "k"));
    let err = rt.raise_in_context(ExcType::ValueError.error("v"));
    let record = err.record().unwrap();
    assert!(!record.is_normalized());
    assert_eq!(record.to_string(), "ValueError: v");

    let err = rt.raise_with_cause(ExcType::ValueError.error("v"), None);
    assert_eq!(err.exc_type(), ExcType::RuntimeError);
}

#[test]
fn explicit_cause_suppresses_context() {
    let mut rt = Runtime::builtin(DialectKind::Classic);
    rt.push_handled(ExceptionRecord::new_msg(ExcType::KeyError, "k"));
    let cause = ExceptionInstance::with_message(ExcType::AttributeError, "disk");
    let err = rt.raise_with_cause(ExcType::ValueError.error("v"), Some(cause));
    let instance = err.record().unwrap().instance().unwrap();
    assert_eq!(instance.cause().unwrap().exc_type(), ExcType::AttributeError);
    assert_eq!(instance.context().unwrap().exc_type(), ExcType::KeyError);
    assert!(instance.suppress_context());

    let err = rt.raise_with_cause(ExcType::ValueError.error("v"), None);
    let instance = err.record().unwrap().instance().unwrap();
    assert!(instance.cause().is_none());
    assert!(instance.suppress_context());
}

#[test]
fn stash_detaches_the_handled_stack() {
    let mut rt = Runtime::builtin(DialectKind::Current);
    rt.push_handled(ExceptionRecord::new_msg(ExcType::KeyError, "outer"));
    let stash = rt.stash_handled();
    assert!(!stash.is_empty());
    assert!(rt.active_exception().is_none());

    rt.push_handled(ExceptionRecord::new_msg(ExcType::ValueError, "inside generator"));
    rt.restore_handled(stash);
    let active = rt.active_exception().unwrap();
    assert_eq!(active.to_string(), "KeyError: outer");
    assert!(rt.pop_handled().is_some());
    assert!(rt.pop_handled().is_none());
}
