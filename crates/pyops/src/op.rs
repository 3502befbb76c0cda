use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// A binary operator of the source language.
///
/// The discriminant doubles as the index into a type's numeric slot table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    /// `@`, absent from the legacy dialect.
    MatMult,
    TrueDiv,
    FloorDiv,
    /// Classic `/` of the legacy dialect: floor division for integers, true division for floats.
    OldDiv,
    Mod,
    /// The `divmod()` builtin, which dispatches like an operator but has no in-place form.
    DivMod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    #[inline]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Operator text used in `unsupported operand type(s) for {op}` messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::MatMult => "@",
            Self::TrueDiv | Self::OldDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::DivMod => "divmod()",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }

    /// Augmented-assignment text, `None` for operators without an in-place form.
    #[must_use]
    pub fn inplace_symbol(self) -> Option<&'static str> {
        Some(match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mult => "*=",
            Self::MatMult => "@=",
            Self::TrueDiv | Self::OldDiv => "/=",
            Self::FloorDiv => "//=",
            Self::Mod => "%=",
            Self::DivMod => return None,
            Self::Pow => "**=",
            Self::LShift => "<<=",
            Self::RShift => ">>=",
            Self::BitAnd => "&=",
            Self::BitOr => "|=",
            Self::BitXor => "^=",
        })
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn indexes_are_dense() {
        for (i, op) in BinaryOp::iter().enumerate() {
            assert_eq!(op.index(), i);
        }
        assert_eq!(BinaryOp::iter().count(), BinaryOp::COUNT);
    }

    #[test]
    fn only_divmod_lacks_inplace_form() {
        let missing: Vec<_> = BinaryOp::iter().filter(|op| op.inplace_symbol().is_none()).collect();
        assert_eq!(missing, vec![BinaryOp::DivMod]);
    }
}
