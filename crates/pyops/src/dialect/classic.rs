use super::{Dialect, DialectKind, NumberFamily};
use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError},
};

/// The 3.0 – 3.13 language family.
///
/// One `int` type, no classic division, `@` available, exception chaining through
/// `__context__`, and pending exceptions stored as lazily normalized (type, value, traceback)
/// triples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classic;

impl Dialect for Classic {
    fn kind(&self) -> DialectKind {
        DialectKind::Classic
    }

    fn supports_operator(&self, op: BinaryOp) -> bool {
        op != BinaryOp::OldDiv
    }

    fn zero_division(&self, family: NumberFamily, op: BinaryOp) -> &'static str {
        match (family, op) {
            (NumberFamily::Int | NumberFamily::Long, BinaryOp::TrueDiv) => "division by zero",
            (NumberFamily::Int | NumberFamily::Long, _) => "integer division or modulo by zero",
            (NumberFamily::Float, BinaryOp::FloorDiv) => "float floor division by zero",
            (NumberFamily::Float, BinaryOp::Mod) => "float modulo",
            (NumberFamily::Float, BinaryOp::DivMod) => "float divmod()",
            (NumberFamily::Float, _) => "float division by zero",
        }
    }

    fn zero_to_negative_power(&self) -> &'static str {
        "0.0 cannot be raised to a negative power"
    }

    fn int_too_large_for_float(&self) -> &'static str {
        "int too large to convert to float"
    }

    fn str_concat_error(&self, other_type: &str) -> RunError {
        ExcType::concat_type_error("str", other_type)
    }

    fn reraise_without_active(&self) -> RunError {
        ExcType::RuntimeError.error("No active exception to reraise")
    }
}
