//! Language-version strategies.
//!
//! The runtime is compiled once and serves three eras of the source language. Everything
//! that differs between them is answered by a [`Dialect`], selected once from
//! [`RuntimeConfig`](crate::RuntimeConfig) when the runtime is built and never consulted for
//! "which version am I" anywhere else:
//!
//! | Dialect | Era | Highlights |
//! |---------|-----|------------|
//! | [`Legacy`] | 2.7 | distinct `int`/`long`, two-sided coercion, classic `/`, lazily normalized exceptions |
//! | [`Classic`] | 3.0 – 3.13 | unified `int`, `@`, exception chaining, lazily normalized exceptions |
//! | [`Current`] | 3.14 | unified `int`, eagerly normalized single-instance exception state, new messages |

mod classic;
mod current;
mod legacy;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub use self::{classic::Classic, current::Current, legacy::Legacy};
use crate::{
    BinaryOp,
    exception_private::{RunError, RunResult},
    object::Obj,
    runtime::Runtime,
};

/// Identifies a language version family.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum DialectKind {
    #[strum(serialize = "2.7")]
    #[serde(alias = "2.7")]
    Legacy,
    #[strum(serialize = "3.11")]
    #[serde(alias = "3.11")]
    Classic,
    #[default]
    #[strum(serialize = "3.14")]
    #[serde(alias = "3.14")]
    Current,
}

impl DialectKind {
    /// The strategy object for this language version.
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Legacy => &Legacy,
            Self::Classic => &Classic,
            Self::Current => &Current,
        }
    }
}

/// Which integer or float implementation raised a division error.
///
/// Several language versions word the same `ZeroDivisionError` differently depending on
/// which numeric type detected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFamily {
    /// Fixed-width integers (and the unified `int` type).
    Int,
    /// The legacy arbitrary-precision `long` type.
    Long,
    Float,
}

/// Version-specific behavior of the operator runtime.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Whether `op` exists as a binary operator in this language version.
    fn supports_operator(&self, op: BinaryOp) -> bool;

    /// Whether types may define the legacy two-sided coercion slot.
    fn supports_coercion(&self) -> bool {
        false
    }

    /// Whether arbitrary-precision integers are a separate `long` type.
    fn has_distinct_long(&self) -> bool {
        false
    }

    /// Last-resort numeric coercion, tried after both direct slots declined.
    ///
    /// Returns `Ok(None)` when coercion does not apply or produced nothing.
    fn coerce_fallback(&self, _rt: &mut Runtime, _op: BinaryOp, _a: &Obj, _b: &Obj) -> RunResult<Option<Obj>> {
        Ok(None)
    }

    /// Message of the `ZeroDivisionError` raised by `op` on the given numeric family.
    fn zero_division(&self, family: NumberFamily, op: BinaryOp) -> &'static str;

    /// Message of the `ZeroDivisionError` raised by `0.0 ** negative`.
    fn zero_to_negative_power(&self) -> &'static str;

    /// Message of the `OverflowError` raised when an integer does not fit a float.
    fn int_too_large_for_float(&self) -> &'static str;

    /// The error for `str + other` when `other` is not a string.
    fn str_concat_error(&self, other_type: &str) -> RunError;

    /// Whether pending exceptions are normalized when they are set.
    fn normalizes_eagerly(&self) -> bool {
        false
    }

    /// Whether raising inside a handler records the handled exception as `__context__`.
    fn chains_exceptions(&self) -> bool {
        true
    }

    /// The error for a bare `raise` with no exception being handled.
    fn reraise_without_active(&self) -> RunError;
}
