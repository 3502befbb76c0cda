//! Type descriptors and the frozen type registry.
//!
//! Builtin types are registered by [`TypeRegistry::builder`] according to the dialect; user
//! types are added with [`TypeRegistryBuilder::define`] and inherit their base's slots. Once
//! built, the registry is immutable and shared behind an `Arc`, so lookups need no locking.

mod boolean;
pub(crate) mod float;
mod instance;
pub(crate) mod int;
pub(crate) mod long_int;
pub(crate) mod sequence;
pub(crate) mod set;

use std::{borrow::Cow, fmt};

use smallvec::{SmallVec, smallvec};

pub(crate) use self::{instance::Instance, long_int::LongInt, set::SetStorage};
use crate::{
    BinaryOp,
    dialect::{Dialect, DialectKind},
    slots::{BinaryFunc, CoerceFunc, NumberMethods, SequenceMethods, TruthFunc},
};

/// Identifies a type in a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const OBJECT: Self = Self(0);
    pub const NONE: Self = Self(1);
    pub const INT: Self = Self(2);
    pub const BOOL: Self = Self(3);
    pub const FLOAT: Self = Self(4);
    pub const STR: Self = Self(5);
    pub const LIST: Self = Self(6);
    pub const TUPLE: Self = Self(7);
    pub const SET: Self = Self(8);
    pub const FROZENSET: Self = Self(9);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A type descriptor.
#[derive(Debug, Clone)]
pub struct TypeObject {
    name: Cow<'static, str>,
    base: Option<TypeId>,
    /// Method resolution order, the type itself first.
    mro: SmallVec<[TypeId; 4]>,
    /// Nearest builtin ancestor whose payload instances wrap, if any.
    builtin_base: Option<TypeId>,
    new_style_number: bool,
    is_builtin: bool,
    number: Option<NumberMethods>,
    sequence: Option<SequenceMethods>,
    truth: Option<TruthFunc>,
}

impl TypeObject {
    fn builtin(name: &'static str, id: TypeId, base: Option<&Self>) -> Self {
        let mut mro: SmallVec<[TypeId; 4]> = smallvec![id];
        if let Some(base) = base {
            mro.extend(base.mro.iter().copied());
        }
        Self {
            name: Cow::Borrowed(name),
            base: base.map(|b| b.mro[0]),
            mro,
            builtin_base: None,
            new_style_number: true,
            is_builtin: true,
            number: base.and_then(|b| b.number),
            sequence: base.and_then(|b| b.sequence),
            truth: None,
        }
    }

    /// Name used verbatim in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    #[must_use]
    pub fn mro(&self) -> &[TypeId] {
        &self.mro
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.is_builtin
    }

    #[must_use]
    pub(crate) fn builtin_base(&self) -> Option<TypeId> {
        self.builtin_base
    }

    /// Whether the type takes part in operator dispatch directly rather than via coercion.
    #[must_use]
    pub fn is_new_style_number(&self) -> bool {
        self.new_style_number
    }

    #[must_use]
    pub fn number(&self) -> Option<&NumberMethods> {
        self.number.as_ref()
    }

    #[must_use]
    pub fn sequence(&self) -> Option<&SequenceMethods> {
        self.sequence.as_ref()
    }

    #[must_use]
    pub fn truth(&self) -> Option<TruthFunc> {
        self.truth
    }
}

/// Description of a user type to add to a registry.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    name: String,
    base: TypeId,
    binary: Vec<(BinaryOp, BinaryFunc)>,
    inplace: Vec<(BinaryOp, BinaryFunc)>,
    coerce: Option<CoerceFunc>,
    truth: Option<TruthFunc>,
    legacy_number: bool,
}

impl TypeSpec {
    /// A new type deriving from `object`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: TypeId::OBJECT,
            binary: Vec::new(),
            inplace: Vec::new(),
            coerce: None,
            truth: None,
            legacy_number: false,
        }
    }

    #[must_use]
    pub fn base(mut self, base: TypeId) -> Self {
        self.base = base;
        self
    }

    /// Defines (or overrides) the binary slot for `op`.
    #[must_use]
    pub fn slot(mut self, op: BinaryOp, func: BinaryFunc) -> Self {
        self.binary.push((op, func));
        self
    }

    /// Defines (or overrides) the in-place slot for `op`.
    #[must_use]
    pub fn inplace_slot(mut self, op: BinaryOp, func: BinaryFunc) -> Self {
        self.inplace.push((op, func));
        self
    }

    /// Defines the legacy coercion slot.
    #[must_use]
    pub fn coerce(mut self, func: CoerceFunc) -> Self {
        self.coerce = Some(func);
        self
    }

    #[must_use]
    pub fn truth(mut self, func: TruthFunc) -> Self {
        self.truth = Some(func);
        self
    }

    /// Marks the type as a legacy-style number: its slots are only reached through coercion.
    #[must_use]
    pub fn legacy_number(mut self) -> Self {
        self.legacy_number = true;
        self
    }
}

/// Error returned when a [`TypeSpec`] cannot be added to a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefinitionError {
    UnknownBase(TypeId),
    /// The base type cannot be subclassed.
    InvalidBase(String),
    /// The operator does not exist in the registry's dialect.
    UnsupportedOperator { op: BinaryOp, dialect: DialectKind },
    /// Coercion slots and legacy-style numbers exist only in the legacy dialect.
    CoercionUnsupported(DialectKind),
    DuplicateName(String),
}

impl fmt::Display for TypeDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBase(id) => write!(f, "unknown base type {id:?}"),
            Self::InvalidBase(name) => write!(f, "type '{name}' is not an acceptable base type"),
            Self::UnsupportedOperator { op, dialect } => {
                write!(f, "operator {op} is not available in dialect {dialect}")
            }
            Self::CoercionUnsupported(dialect) => {
                write!(f, "numeric coercion is not available in dialect {dialect}")
            }
            Self::DuplicateName(name) => write!(f, "type '{name}' is already defined"),
        }
    }
}

impl std::error::Error for TypeDefinitionError {}

/// The frozen set of types a runtime dispatches over.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    dialect: DialectKind,
    types: Vec<TypeObject>,
    big_int: TypeId,
}

impl TypeRegistry {
    /// Starts a registry containing the builtin types of `dialect`.
    #[must_use]
    pub fn builder(dialect: DialectKind) -> TypeRegistryBuilder {
        TypeRegistryBuilder::new(dialect)
    }

    /// A registry with only the builtin types.
    #[must_use]
    pub fn with_builtins(dialect: DialectKind) -> Self {
        Self::builder(dialect).build()
    }

    #[must_use]
    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    /// # Panics
    /// Panics if `id` was not issued by this registry.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &TypeObject {
        &self.types[id.index()]
    }

    #[must_use]
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).name()
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.types.iter().position(|t| t.name == name).map(type_id_at)
    }

    /// The type of arbitrary-precision integers: `long` in the legacy dialect, `int` otherwise.
    #[must_use]
    pub fn big_int_type(&self) -> TypeId {
        self.big_int
    }

    /// Whether `sub` is a strict subtype of `sup`.
    #[must_use]
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        sub != sup && self.get(sub).mro.contains(&sup)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn type_id_at(index: usize) -> TypeId {
    TypeId(u32::try_from(index).expect("type registry exceeds u32::MAX entries"))
}

/// Accumulates type definitions before the registry is frozen.
#[derive(Debug)]
pub struct TypeRegistryBuilder {
    dialect: &'static dyn Dialect,
    types: Vec<TypeObject>,
    big_int: TypeId,
}

impl TypeRegistryBuilder {
    fn new(kind: DialectKind) -> Self {
        let dialect = kind.dialect();
        let mut builder = Self {
            dialect,
            types: Vec::with_capacity(16),
            big_int: TypeId::INT,
        };
        builder.register_builtins();
        builder
    }

    fn push_builtin(&mut self, name: &'static str, id: TypeId, base: Option<TypeId>) -> &mut TypeObject {
        debug_assert_eq!(id.index(), self.types.len());
        let base = base.map(|b| &self.types[b.index()]);
        let tp = TypeObject::builtin(name, id, base);
        self.types.push(tp);
        self.types.last_mut().expect("just pushed")
    }

    fn register_builtins(&mut self) {
        let dialect = self.dialect;
        let object = Some(TypeId::OBJECT);

        self.push_builtin("object", TypeId::OBJECT, None);
        self.push_builtin("NoneType", TypeId::NONE, object);

        let int = self.push_builtin("int", TypeId::INT, object);
        int.number = Some(int::number_methods(dialect, int::IntFlavor::for_int_type(dialect)));

        let bool_type = self.push_builtin("bool", TypeId::BOOL, Some(TypeId::INT));
        let mut number = bool_type.number.unwrap_or_default();
        number.install(boolean::BOOL_SLOTS);
        bool_type.number = Some(number);

        let float = self.push_builtin("float", TypeId::FLOAT, object);
        float.number = Some(float::number_methods(dialect));

        self.push_builtin("str", TypeId::STR, object).sequence = Some(sequence::str_methods());
        self.push_builtin("list", TypeId::LIST, object).sequence = Some(sequence::list_methods());
        self.push_builtin("tuple", TypeId::TUPLE, object).sequence = Some(sequence::tuple_methods());
        self.push_builtin("set", TypeId::SET, object).number = Some(set::set_methods());
        self.push_builtin("frozenset", TypeId::FROZENSET, object).number = Some(set::frozenset_methods());

        if dialect.has_distinct_long() {
            let id = type_id_at(self.types.len());
            let long = self.push_builtin("long", id, object);
            long.number = Some(int::number_methods(dialect, int::IntFlavor::Long));
            self.big_int = id;
        }
    }

    /// Adds a user type, inheriting the base's slots and overriding the ones `spec` defines.
    pub fn define(&mut self, spec: TypeSpec) -> Result<TypeId, TypeDefinitionError> {
        let kind = self.dialect.kind();
        let base = self
            .types
            .get(spec.base.index())
            .ok_or(TypeDefinitionError::UnknownBase(spec.base))?;
        if matches!(spec.base, TypeId::BOOL | TypeId::NONE) {
            return Err(TypeDefinitionError::InvalidBase(base.name.to_string()));
        }
        if self.types.iter().any(|t| t.name == spec.name) {
            return Err(TypeDefinitionError::DuplicateName(spec.name));
        }
        if (spec.coerce.is_some() || spec.legacy_number) && !self.dialect.supports_coercion() {
            return Err(TypeDefinitionError::CoercionUnsupported(kind));
        }
        if let Some(&(op, _)) = spec
            .binary
            .iter()
            .chain(&spec.inplace)
            .find(|(op, _)| !self.dialect.supports_operator(*op))
        {
            return Err(TypeDefinitionError::UnsupportedOperator { op, dialect: kind });
        }

        let id = type_id_at(self.types.len());
        let mut mro: SmallVec<[TypeId; 4]> = smallvec![id];
        mro.extend(base.mro.iter().copied());
        let builtin_base = match base.builtin_base {
            Some(b) => Some(b),
            None if base.is_builtin && spec.base != TypeId::OBJECT => Some(spec.base),
            None => None,
        };

        let mut number = base.number;
        if !spec.binary.is_empty() || !spec.inplace.is_empty() || spec.coerce.is_some() {
            let table = number.get_or_insert_with(NumberMethods::default);
            table.install(&spec.binary);
            table.install_inplace(&spec.inplace);
            if spec.coerce.is_some() {
                table.coerce = spec.coerce;
            }
        }

        let tp = TypeObject {
            name: Cow::Owned(spec.name),
            base: Some(spec.base),
            mro,
            builtin_base,
            new_style_number: !spec.legacy_number,
            is_builtin: false,
            number,
            sequence: base.sequence,
            truth: spec.truth.or(base.truth),
        };
        self.types.push(tp);
        Ok(id)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            dialect: self.dialect.kind(),
            types: self.types,
            big_int: self.big_int,
        }
    }
}
