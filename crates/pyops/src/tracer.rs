//! Dispatch tracing.
//!
//! A runtime carries one [`DispatchTracer`], chosen when it is built. The hooks fire at the
//! decision points of operator dispatch: which path an operation took, which slots were
//! called and what they answered, whether coercion or the sequence fallback was reached, and
//! which exceptions were set.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Production default, skips hook preparation entirely |
//! | [`StderrTracer`] | Human-readable dispatch log to stderr |
//! | [`ProfilingTracer`] | Per-operator counts of fast-path and generic dispatch |
//! | [`RecordingTracer`] | Full event recording, used by tests to observe slot order |
//!
//! ```
//! use pyops::{BinaryOp, DialectKind, RecordingTracer, Runtime};
//!
//! let mut rt = Runtime::builtin(DialectKind::Current).with_tracer(RecordingTracer::new());
//! let a = rt.new_int(2).unwrap();
//! let b = rt.new_float(0.5).unwrap();
//! let sum = rt.binary_operation(BinaryOp::Add, &a, &b).unwrap();
//! assert!(!rt.tracer_as::<RecordingTracer>().unwrap().events().is_empty());
//! for obj in [a, b, sum] {
//!     rt.release(obj);
//! }
//! ```

use std::{any::Any, collections::BTreeMap};

use crate::{
    BinaryOp,
    dispatch::{OperationForm, SlotSide},
    exception_private::ExcType,
    runtime::Runtime,
    types::TypeId,
};

/// Trace event captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An operation entered dispatch.
    Dispatch {
        op: BinaryOp,
        form: OperationForm,
        left: String,
        right: String,
    },
    /// The specialized fast path produced the result.
    FastPath { op: BinaryOp, form: OperationForm },
    /// A type slot was called.
    SlotCall {
        op: BinaryOp,
        /// Type whose slot was called.
        owner: String,
        side: SlotSide,
        /// `false` when the slot answered `NotImplemented`.
        implemented: bool,
    },
    /// A legacy coercion slot was called.
    Coercion {
        op: BinaryOp,
        owner: String,
        succeeded: bool,
    },
    /// Dispatch fell back to a sequence capability.
    SequenceFallback { op: BinaryOp, owner: String },
    /// An in-place operation overwrote its exclusively owned target.
    InPlaceReuse { op: BinaryOp },
    /// An exception became pending.
    ExceptionSet { exc_type: ExcType },
}

/// Hooks called during operator dispatch.
///
/// All methods have default no-op implementations; implementations only override the hooks
/// they care about.
pub trait DispatchTracer: std::fmt::Debug + Any {
    /// Whether hooks should be called at all; returning `false` lets the runtime skip looking
    /// up the type names the hooks receive.
    fn is_active(&self) -> bool {
        true
    }

    fn on_dispatch(&mut self, _op: BinaryOp, _form: OperationForm, _left: &str, _right: &str) {}

    fn on_fast_path(&mut self, _op: BinaryOp, _form: OperationForm) {}

    fn on_slot_call(&mut self, _op: BinaryOp, _owner: &str, _side: SlotSide, _implemented: bool) {}

    fn on_coercion(&mut self, _op: BinaryOp, _owner: &str, _succeeded: bool) {}

    fn on_sequence_fallback(&mut self, _op: BinaryOp, _owner: &str) {}

    fn on_inplace_reuse(&mut self, _op: BinaryOp) {}

    fn on_exception_set(&mut self, _exc_type: ExcType) {}
}

// ============================================================================
// NoopTracer: production default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl DispatchTracer for NoopTracer {
    #[inline]
    fn is_active(&self) -> bool {
        false
    }
}

// ============================================================================
// StderrTracer: human-readable dispatch log
// ============================================================================

/// Tracer that prints a human-readable dispatch log to stderr.
///
/// Output format:
/// ```text
/// Add    [Binary] 'Money' + 'int'
///   slot Money (Left) -> value
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print before going quiet. None = unlimited.
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn emit(&mut self, line: &str) {
        if self.limit.is_some_and(|limit| self.count >= limit) {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count == limit
        {
            eprintln!("--- trace limit reached ({limit} lines) ---");
        }
    }
}

impl DispatchTracer for StderrTracer {
    fn is_active(&self) -> bool {
        self.limit.is_none_or(|limit| self.count < limit)
    }

    fn on_dispatch(&mut self, op: BinaryOp, form: OperationForm, left: &str, right: &str) {
        self.emit(&format!("{op:<8} [{form:?}] '{left}' {} '{right}'", op.symbol()));
    }

    fn on_fast_path(&mut self, _op: BinaryOp, _form: OperationForm) {
        self.emit("  fast path");
    }

    fn on_slot_call(&mut self, _op: BinaryOp, owner: &str, side: SlotSide, implemented: bool) {
        let outcome = if implemented { "value" } else { "NotImplemented" };
        self.emit(&format!("  slot {owner} ({side:?}) -> {outcome}"));
    }

    fn on_coercion(&mut self, _op: BinaryOp, owner: &str, succeeded: bool) {
        self.emit(&format!("  coerce {owner} -> {succeeded}"));
    }

    fn on_sequence_fallback(&mut self, _op: BinaryOp, owner: &str) {
        self.emit(&format!("  sequence {owner}"));
    }

    fn on_inplace_reuse(&mut self, _op: BinaryOp) {
        self.emit("  reused target");
    }

    fn on_exception_set(&mut self, exc_type: ExcType) {
        self.emit(&format!("  !!! {exc_type}"));
    }
}

// ============================================================================
// ProfilingTracer: fast-path hit rates
// ============================================================================

/// Per-operator dispatch statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorStats {
    pub dispatched: u64,
    pub fast_path: u64,
    pub slot_calls: u64,
    pub coercions: u64,
    pub sequence_fallbacks: u64,
}

/// Tracer that counts how often each operator took the fast path.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    by_operator: BTreeMap<BinaryOp, OperatorStats>,
    exceptions: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingReport {
    /// Per-operator counts, most dispatched first.
    pub operators: Vec<(BinaryOp, OperatorStats)>,
    pub exceptions: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut operators: Vec<_> = self.by_operator.iter().map(|(&op, &stats)| (op, stats)).collect();
        operators.sort_by(|a, b| b.1.dispatched.cmp(&a.1.dispatched));
        ProfilingReport {
            operators,
            exceptions: self.exceptions,
        }
    }

    fn stats(&mut self, op: BinaryOp) -> &mut OperatorStats {
        self.by_operator.entry(op).or_default()
    }
}

impl DispatchTracer for ProfilingTracer {
    fn on_dispatch(&mut self, op: BinaryOp, _form: OperationForm, _left: &str, _right: &str) {
        self.stats(op).dispatched += 1;
    }

    fn on_fast_path(&mut self, op: BinaryOp, _form: OperationForm) {
        self.stats(op).fast_path += 1;
    }

    fn on_slot_call(&mut self, op: BinaryOp, _owner: &str, _side: SlotSide, _implemented: bool) {
        self.stats(op).slot_calls += 1;
    }

    fn on_coercion(&mut self, op: BinaryOp, _owner: &str, _succeeded: bool) {
        self.stats(op).coercions += 1;
    }

    fn on_sequence_fallback(&mut self, op: BinaryOp, _owner: &str) {
        self.stats(op).sequence_fallbacks += 1;
    }

    fn on_exception_set(&mut self, _exc_type: ExcType) {
        self.exceptions += 1;
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records every event.
///
/// This is the most expensive tracer (allocates per event), so use it only for debugging
/// specific issues or in tests.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Drops the events recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// The slot calls recorded so far, as `(owner, side, implemented)`.
    #[must_use]
    pub fn slot_calls(&self) -> Vec<(&str, SlotSide, bool)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::SlotCall {
                    owner,
                    side,
                    implemented,
                    ..
                } => Some((owner.as_str(), *side, *implemented)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|limit| self.events.len() >= limit) {
            return;
        }
        self.events.push(event);
    }
}

impl DispatchTracer for RecordingTracer {
    fn on_dispatch(&mut self, op: BinaryOp, form: OperationForm, left: &str, right: &str) {
        self.record(TraceEvent::Dispatch {
            op,
            form,
            left: left.to_owned(),
            right: right.to_owned(),
        });
    }

    fn on_fast_path(&mut self, op: BinaryOp, form: OperationForm) {
        self.record(TraceEvent::FastPath { op, form });
    }

    fn on_slot_call(&mut self, op: BinaryOp, owner: &str, side: SlotSide, implemented: bool) {
        self.record(TraceEvent::SlotCall {
            op,
            owner: owner.to_owned(),
            side,
            implemented,
        });
    }

    fn on_coercion(&mut self, op: BinaryOp, owner: &str, succeeded: bool) {
        self.record(TraceEvent::Coercion {
            op,
            owner: owner.to_owned(),
            succeeded,
        });
    }

    fn on_sequence_fallback(&mut self, op: BinaryOp, owner: &str) {
        self.record(TraceEvent::SequenceFallback {
            op,
            owner: owner.to_owned(),
        });
    }

    fn on_inplace_reuse(&mut self, op: BinaryOp) {
        self.record(TraceEvent::InPlaceReuse { op });
    }

    fn on_exception_set(&mut self, exc_type: ExcType) {
        self.record(TraceEvent::ExceptionSet { exc_type });
    }
}

/// Hook call sites used by dispatch; each one skips name lookups for inactive tracers.
impl Runtime {
    /// The installed tracer, downcast to its concrete type.
    #[must_use]
    pub fn tracer_as<T: DispatchTracer>(&self) -> Option<&T> {
        let tracer: &dyn DispatchTracer = &*self.tracer;
        let tracer: &dyn Any = tracer;
        tracer.downcast_ref::<T>()
    }

    /// Mutable access to the installed tracer, e.g. to clear a [`RecordingTracer`].
    #[must_use]
    pub fn tracer_as_mut<T: DispatchTracer>(&mut self) -> Option<&mut T> {
        let tracer: &mut dyn DispatchTracer = &mut *self.tracer;
        let tracer: &mut dyn Any = tracer;
        tracer.downcast_mut::<T>()
    }

    pub(crate) fn trace_dispatch(&mut self, op: BinaryOp, form: OperationForm, left: TypeId, right: TypeId) {
        if self.tracer.is_active() {
            self.tracer
                .on_dispatch(op, form, self.types.name(left), self.types.name(right));
        }
    }

    pub(crate) fn trace_fast_path(&mut self, op: BinaryOp, form: OperationForm) {
        if self.tracer.is_active() {
            self.tracer.on_fast_path(op, form);
        }
    }

    pub(crate) fn trace_slot(&mut self, op: BinaryOp, owner: TypeId, side: SlotSide, implemented: bool) {
        if self.tracer.is_active() {
            self.tracer.on_slot_call(op, self.types.name(owner), side, implemented);
        }
    }

    pub(crate) fn trace_coercion(&mut self, op: BinaryOp, owner: TypeId, succeeded: bool) {
        if self.tracer.is_active() {
            self.tracer.on_coercion(op, self.types.name(owner), succeeded);
        }
    }

    pub(crate) fn trace_sequence_fallback(&mut self, op: BinaryOp, owner: TypeId) {
        if self.tracer.is_active() {
            self.tracer.on_sequence_fallback(op, self.types.name(owner));
        }
    }

    pub(crate) fn trace_inplace_reuse(&mut self, op: BinaryOp) {
        if self.tracer.is_active() {
            self.tracer.on_inplace_reuse(op);
        }
    }

    pub(crate) fn trace_exception_set(&mut self, exc_type: ExcType) {
        if self.tracer.is_active() {
            self.tracer.on_exception_set(exc_type);
        }
    }
}
