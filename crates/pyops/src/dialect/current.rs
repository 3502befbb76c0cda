use super::{Dialect, DialectKind, NumberFamily};
use crate::{
    BinaryOp,
    exception_private::{ExcType, RunError},
};

/// The 3.14 language family.
///
/// Shares the operator set of [`Classic`](super::Classic) but stores the pending exception as
/// a single normalized instance and uses the reworded division messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Current;

impl Dialect for Current {
    fn kind(&self) -> DialectKind {
        DialectKind::Current
    }

    fn supports_operator(&self, op: BinaryOp) -> bool {
        op != BinaryOp::OldDiv
    }

    fn zero_division(&self, family: NumberFamily, op: BinaryOp) -> &'static str {
        match (family, op) {
            (NumberFamily::Int | NumberFamily::Long, BinaryOp::Mod) => "integer modulo by zero",
            (NumberFamily::Int | NumberFamily::Long, BinaryOp::FloorDiv | BinaryOp::DivMod) => {
                "integer division or modulo by zero"
            }
            _ => "division by zero",
        }
    }

    fn zero_to_negative_power(&self) -> &'static str {
        "zero to a negative power"
    }

    fn int_too_large_for_float(&self) -> &'static str {
        "int too large to convert to float"
    }

    fn str_concat_error(&self, other_type: &str) -> RunError {
        ExcType::concat_type_error("str", other_type)
    }

    fn normalizes_eagerly(&self) -> bool {
        true
    }

    fn reraise_without_active(&self) -> RunError {
        ExcType::RuntimeError.error("No active exception to reraise")
    }
}
