//! Pending and handled exception state of a runtime.
//!
//! Compiled code reports failure by leaving an exception pending and returning a sentinel.
//! The pending slot is set on failure, consumed by [`Runtime::fetch_pending`] and put back by
//! [`Runtime::restore_pending`]. Separately, every `except` block being executed pushes the
//! exception it caught onto the handled stack; that stack is what a bare `raise` re-raises
//! and what implicit chaining records as `__context__`.
//!
//! How much of this is eager depends on the dialect: the 3.14 model normalizes a record the
//! moment it becomes pending, older models keep `(type, value, traceback)` apart until
//! someone asks for the instance.

use crate::{
    exception_private::{ExceptionInstance, ExceptionRecord, RunError},
    runtime::Runtime,
};

#[derive(Debug, Default)]
pub(crate) struct ThreadState {
    pending: Option<ExceptionRecord>,
    /// Exceptions caught by the `except` blocks currently executing, innermost last.
    handled: Vec<ExceptionRecord>,
}

/// The handled-exception stack of a suspended frame, saved by [`Runtime::stash_handled`].
#[derive(Debug, Default, Clone, PartialEq)]
#[must_use = "a stash must be given back with Runtime::restore_handled"]
pub struct HandledStash {
    records: Vec<ExceptionRecord>,
}

impl HandledStash {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Runtime {
    /// Makes `err` the pending exception, replacing any exception already pending.
    pub fn set_pending(&mut self, err: RunError) {
        self.store_pending(err.into_record());
    }

    fn store_pending(&mut self, mut record: ExceptionRecord) {
        if self.dialect.normalizes_eagerly() {
            record.normalize();
        }
        self.trace_exception_set(record.exc_type());
        self.thread_state.pending = Some(record);
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.thread_state.pending.is_some()
    }

    /// The pending exception, without clearing it.
    #[must_use]
    pub fn pending(&self) -> Option<&ExceptionRecord> {
        self.thread_state.pending.as_ref()
    }

    /// Takes the pending exception, leaving none pending.
    pub fn fetch_pending(&mut self) -> Option<ExceptionRecord> {
        self.thread_state.pending.take()
    }

    /// Puts back a record taken by [`fetch_pending`](Self::fetch_pending); `None` clears the
    /// pending state.
    pub fn restore_pending(&mut self, record: Option<ExceptionRecord>) {
        match record {
            Some(record) => self.store_pending(record),
            None => self.thread_state.pending = None,
        }
    }

    /// Normalizes the pending exception in place, returning its instance.
    pub fn normalize_pending(&mut self) -> Option<&ExceptionInstance> {
        let record = self.thread_state.pending.as_mut()?;
        record.normalize();
        record.instance()
    }

    /// Enters an `except` block that caught `record`.
    pub fn push_handled(&mut self, mut record: ExceptionRecord) {
        record.normalize();
        self.thread_state.handled.push(record);
    }

    /// Leaves the innermost `except` block.
    pub fn pop_handled(&mut self) -> Option<ExceptionRecord> {
        self.thread_state.handled.pop()
    }

    /// The exception being handled by the innermost `except` block, `sys.exc_info()`.
    #[must_use]
    pub fn active_exception(&self) -> Option<&ExceptionRecord> {
        self.thread_state.handled.last()
    }

    /// Detaches the whole handled stack, e.g. when a generator frame is suspended.
    pub fn stash_handled(&mut self) -> HandledStash {
        HandledStash {
            records: std::mem::take(&mut self.thread_state.handled),
        }
    }

    /// Reinstates a stack saved by [`stash_handled`](Self::stash_handled), dropping whatever
    /// was handled in between.
    pub fn restore_handled(&mut self, stash: HandledStash) {
        self.thread_state.handled = stash.records;
    }

    /// Prepares `err` for raising at the current point: in dialects with chaining, the
    /// exception being handled becomes its `__context__`.
    ///
    /// Re-raising the handled exception itself never links it to itself.
    #[must_use]
    pub fn raise_in_context(&self, err: RunError) -> RunError {
        if !self.dialect.chains_exceptions() {
            return err;
        }
        let Some(active) = self.active_exception().and_then(ExceptionRecord::instance) else {
            return err;
        };
        map_record(err, |record| {
            let instance = record.instance_mut();
            if instance != active {
                instance.set_context(Some(active.clone()));
            }
        })
    }

    /// `raise err from cause`; `None` is `from None`, which only suppresses the context.
    ///
    /// The legacy dialect has no explicit chaining and reports an internal error.
    #[must_use]
    pub fn raise_with_cause(&self, err: RunError, cause: Option<ExceptionInstance>) -> RunError {
        if !self.dialect.chains_exceptions() {
            return RunError::internal(format!(
                "explicit exception chaining is not available in dialect {}",
                self.dialect.kind()
            ));
        }
        let err = map_record(err, |record| record.instance_mut().set_cause(cause));
        self.raise_in_context(err)
    }

    /// A bare `raise`: the exception currently being handled, traceback included.
    #[must_use]
    pub fn reraise(&self) -> RunError {
        match self.active_exception() {
            Some(record) => record.clone().into(),
            None => self.dialect.reraise_without_active(),
        }
    }
}

/// Applies `f` to the record of a catchable or uncatchable error.
fn map_record(err: RunError, f: impl FnOnce(&mut ExceptionRecord)) -> RunError {
    match err {
        RunError::Internal(_) => err,
        RunError::Exc(mut record) => {
            f(&mut record);
            RunError::Exc(record)
        }
        RunError::UncatchableExc(mut record) => {
            f(&mut record);
            RunError::UncatchableExc(record)
        }
    }
}
