//! The sentinel-return boundary used by generated code.
//!
//! Generated code does not propagate `Result`s: a failing helper returns a sentinel
//! (`None`, [`NBool::Exception`] or `false`) and leaves its exception pending on the runtime,
//! where the enclosing handler later fetches it.

use crate::{
    BinaryOp,
    exception_private::{ExceptionRecord, RunResult},
    object::Obj,
    runtime::Runtime,
};

/// Truth value or failure, as returned by the `nbool` helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum NBool {
    True = 1,
    False = 0,
    /// An exception is pending.
    Exception = -1,
}

impl NBool {
    #[must_use]
    pub fn is_exception(self) -> bool {
        self == Self::Exception
    }

    /// The truth value, `None` for [`NBool::Exception`].
    #[must_use]
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Exception => None,
        }
    }
}

impl From<bool> for NBool {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

/// Moves the error of `result` into the pending state.
fn settle<T>(rt: &mut Runtime, result: RunResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            rt.set_pending(err);
            None
        }
    }
}

/// `a op b`; `None` with an exception pending on failure.
#[must_use]
pub fn binary_operation(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> Option<Obj> {
    let result = rt.binary_operation(op, a, b);
    settle(rt, result)
}

/// Truth of `a op b`.
#[must_use]
pub fn binary_operation_nbool(rt: &mut Runtime, op: BinaryOp, a: &Obj, b: &Obj) -> NBool {
    let result = rt.binary_operation_bool(op, a, b);
    settle(rt, result).map_or(NBool::Exception, NBool::from)
}

/// `target op= value`; `false` with an exception pending and `target` unchanged on failure.
#[must_use]
pub fn inplace_operation(rt: &mut Runtime, op: BinaryOp, target: &mut Obj, value: &Obj) -> bool {
    let result = rt.inplace_operation(op, target, value);
    settle(rt, result).is_some()
}

#[must_use]
pub fn error_occurred(rt: &Runtime) -> bool {
    rt.has_pending()
}

/// Takes the pending exception, clearing it.
pub fn fetch_error(rt: &mut Runtime) -> Option<ExceptionRecord> {
    rt.fetch_pending()
}

/// Makes `record` pending again; `None` clears the pending state.
pub fn restore_error(rt: &mut Runtime, record: Option<ExceptionRecord>) {
    rt.restore_pending(record);
}
