#![doc = include_str!("../../../README.md")]
#![expect(clippy::float_cmp, reason = "IEEE special cases compare exact values")]
// first to include defer_drop macro
mod heap;

pub mod abi;
mod config;
mod dialect;
mod dispatch;
pub mod entry;
mod exception_private;
mod exception_state;
mod object;
mod op;
mod resource;
mod runtime;
mod slots;
pub mod tracer;
mod types;

pub use crate::{
    abi::NBool,
    config::{ConfigError, RuntimeConfig},
    dialect::{Classic, Current, Dialect, DialectKind, Legacy, NumberFamily},
    dispatch::{OperationForm, SlotSide},
    entry::OperandKind,
    exception_private::{
        ExcType, ExcValue, ExceptionInstance, ExceptionRecord, RunError, RunResult, Traceback, TracebackFrame,
    },
    exception_state::HandledStash,
    heap::{HeapId, HeapStats},
    object::Obj,
    op::BinaryOp,
    resource::{LARGE_RESULT_THRESHOLD, ResourceError, ResourceLimits},
    runtime::Runtime,
    slots::{
        BinaryFunc, CoerceFunc, Coercion, ConcatFunc, NumberMethods, RepeatFunc, SequenceMethods, SlotResult, TruthFunc,
        same_slot,
    },
    tracer::{
        DispatchTracer, NoopTracer, OperatorStats, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer,
        TraceEvent,
    },
    types::{TypeDefinitionError, TypeId, TypeObject, TypeRegistry, TypeRegistryBuilder, TypeSpec},
};
