//! Runtime construction from configuration.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use pyops::{ConfigError, DialectKind, ExcType, ResourceLimits, Runtime, RuntimeConfig, TypeRegistry};

#[test]
fn json_round_trip_keeps_limits() {
    let config = RuntimeConfig::new(DialectKind::Legacy)
        .with_limits(ResourceLimits::new().max_allocations(100).max_memory(4096))
        .with_heap_capacity(32);
    let json = config.to_json().unwrap();
    assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
}

#[test]
fn registry_dialect_must_match() {
    let config = RuntimeConfig::new(DialectKind::Current);
    let registry = Arc::new(TypeRegistry::with_builtins(DialectKind::Legacy));
    let err = Runtime::new(config, registry).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DialectMismatch {
            config: DialectKind::Current,
            registry: DialectKind::Legacy
        }
    ));
    assert_eq!(
        err.to_string(),
        "type registry was built for dialect 2.7 but the configuration selects 3.14"
    );
}

#[test]
fn invalid_json_is_reported() {
    let err = RuntimeConfig::from_json("{\"heap_capacity\": -1}").unwrap_err();
    assert!(err.to_string().starts_with("invalid runtime configuration: "));
}

#[test]
fn allocation_limit_applies_to_operations() {
    let config = RuntimeConfig::from_json(r#"{"dialect": "3.11", "limits": {"max_allocations": 8}}"#).unwrap();
    let mut rt = Runtime::new(config, TypeRegistry::with_builtins(DialectKind::Classic)).unwrap();
    let mut held = Vec::new();
    let err = loop {
        match rt.new_int(1) {
            Ok(obj) => held.push(obj),
            Err(err) => break err,
        }
    };
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert!(!err.is_catchable());

    let one = held.pop().unwrap();
    let err = rt.binary_operation(pyops::BinaryOp::Add, &one, &one).unwrap_err();
    assert!(err.to_string().starts_with("MemoryError: allocation limit exceeded"), "{err}");
    let last = rt.binary_operation(pyops::BinaryOp::Add, &one, &one);
    assert!(last.is_err());
    rt.release(one);
    let two = rt.binary_operation(pyops::BinaryOp::Add, &held[0], &held[0]).unwrap();
    assert_eq!(rt.int_value(&two), Some(2));
    rt.release(two);
    for obj in held {
        rt.release(obj);
    }
}
