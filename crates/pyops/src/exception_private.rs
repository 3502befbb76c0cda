use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Builtin exception types raised by the operator runtime.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// primary exception class - matches any exception in isinstance checks.
    Exception,

    /// System exit exceptions
    BaseException,
    SystemExit,
    KeyboardInterrupt,
    GeneratorExit,

    // --- ArithmeticError hierarchy ---
    /// Intermediate class for arithmetic errors.
    ArithmeticError,
    /// Subclass of ArithmeticError.
    FloatingPointError,
    /// Subclass of ArithmeticError.
    OverflowError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    /// Intermediate class for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError.
    KeyError,

    // --- RuntimeError hierarchy ---
    /// Intermediate class for runtime errors.
    RuntimeError,
    /// Subclass of RuntimeError.
    NotImplementedError,
    /// Subclass of RuntimeError.
    RecursionError,

    // --- Standalone exception types ---
    AssertionError,
    AttributeError,
    MemoryError,
    StopIteration,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Implements the builtin exception hierarchy for `except` matching:
    /// - `BaseException` is the root of all exceptions
    /// - `Exception` catches everything except `BaseException` and its direct-only subclasses
    /// - `ArithmeticError`, `LookupError` and `RuntimeError` catch their subclasses
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::BaseException => true,
            Self::Exception => !matches!(
                self,
                Self::BaseException | Self::KeyboardInterrupt | Self::SystemExit | Self::GeneratorExit
            ),
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => {
                matches!(
                    self,
                    Self::FloatingPointError | Self::ZeroDivisionError | Self::OverflowError
                )
            }
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            _ => false,
        }
    }

    /// Creates an unnormalized exception carrying a single message argument.
    #[must_use]
    pub fn error(self, msg: impl Display) -> RunError {
        ExceptionRecord::new_msg(self, msg.to_string()).into()
    }

    #[must_use]
    pub(crate) fn type_error(msg: impl Display) -> RunError {
        Self::TypeError.error(msg)
    }

    #[must_use]
    pub(crate) fn value_error(msg: impl Display) -> RunError {
        Self::ValueError.error(msg)
    }

    #[must_use]
    pub(crate) fn overflow_error(msg: impl Display) -> RunError {
        Self::OverflowError.error(msg)
    }

    /// Creates a ZeroDivisionError; the wording differs between language versions so the
    /// caller passes the message chosen by its dialect.
    #[must_use]
    pub(crate) fn zero_division(msg: &'static str) -> RunError {
        Self::ZeroDivisionError.error(msg)
    }

    /// Creates a TypeError for unsupported binary operations.
    ///
    /// Uses the reference format: `unsupported operand type(s) for {op}: '{left}' and '{right}'`
    #[must_use]
    pub(crate) fn binary_type_error(op: &str, lhs_type: &str, rhs_type: &str) -> RunError {
        Self::type_error(format!(
            "unsupported operand type(s) for {op}: '{lhs_type}' and '{rhs_type}'"
        ))
    }

    /// `can only concatenate {seq} (not "{other}") to {seq}`
    #[must_use]
    pub(crate) fn concat_type_error(seq_type: &str, other_type: &str) -> RunError {
        Self::type_error(format!(
            "can only concatenate {seq_type} (not \"{other_type}\") to {seq_type}"
        ))
    }

    /// Raised when the count operand of a sequence repetition is not an integer.
    #[must_use]
    pub(crate) fn cant_multiply_sequence(other_type: &str) -> RunError {
        Self::type_error(format!("can't multiply sequence by non-int of type '{other_type}'"))
    }

    #[must_use]
    pub(crate) fn not_iterable(type_name: &str) -> RunError {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }

    #[must_use]
    pub(crate) fn unhashable(type_name: &str) -> RunError {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    /// Creates a ValueError for negative shift count in bitwise shift operations.
    #[must_use]
    pub(crate) fn negative_shift_count() -> RunError {
        Self::value_error("negative shift count")
    }

    /// Creates an OverflowError for a shift count exceeding the machine index size.
    #[must_use]
    pub(crate) fn overflow_shift_count() -> RunError {
        Self::overflow_error("Python int too large to convert to C ssize_t")
    }

    /// Creates an OverflowError for sequence repetition with a count too large.
    #[must_use]
    pub(crate) fn overflow_repeat_count() -> RunError {
        Self::overflow_error("cannot fit 'int' into an index-sized integer")
    }

    #[must_use]
    pub(crate) fn negative_fractional_power() -> RunError {
        Self::value_error("negative number cannot be raised to a fractional power")
    }

    /// Float results that overflow report the C library errno text.
    #[must_use]
    pub(crate) fn float_result_out_of_range() -> RunError {
        Self::overflow_error("(34, 'Numerical result out of range')")
    }

    #[must_use]
    pub(crate) fn integer_division_too_large() -> RunError {
        Self::overflow_error("integer division result too large for a float")
    }

    #[must_use]
    pub(crate) fn exponent_too_large() -> RunError {
        Self::overflow_error("exponent too large")
    }
}

/// One frame of a traceback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracebackFrame {
    pub function: String,
    pub line: u32,
}

/// Frames recorded while an exception propagated, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traceback {
    frames: Vec<TracebackFrame>,
}

impl Traceback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, function: impl Into<String>, line: u32) {
        self.frames.push(TracebackFrame {
            function: function.into(),
            line,
        });
    }

    #[must_use]
    pub fn frames(&self) -> &[TracebackFrame] {
        &self.frames
    }
}

/// A normalized exception object.
///
/// Holds the exception's class, its constructor arguments, and the chaining attributes
/// `__cause__`, `__context__` and `__suppress_context__`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInstance {
    exc_type: ExcType,
    args: Vec<String>,
    cause: Option<Box<ExceptionInstance>>,
    context: Option<Box<ExceptionInstance>>,
    suppress_context: bool,
    traceback: Option<Traceback>,
}

impl ExceptionInstance {
    #[must_use]
    pub fn new(exc_type: ExcType, args: Vec<String>) -> Self {
        Self {
            exc_type,
            args,
            cause: None,
            context: None,
            suppress_context: false,
            traceback: None,
        }
    }

    #[must_use]
    pub fn with_message(exc_type: ExcType, msg: impl Into<String>) -> Self {
        Self::new(exc_type, vec![msg.into()])
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The `str()` of the exception: the sole argument, nothing for no arguments, or the
    /// tuple form for several.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.args.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => {
                let parts: Vec<String> = many.iter().map(|a| format!("'{a}'")).collect();
                Some(format!("({})", parts.join(", ")))
            }
        }
    }

    #[must_use]
    pub fn cause(&self) -> Option<&Self> {
        self.cause.as_deref()
    }

    #[must_use]
    pub fn context(&self) -> Option<&Self> {
        self.context.as_deref()
    }

    #[must_use]
    pub fn suppress_context(&self) -> bool {
        self.suppress_context
    }

    #[must_use]
    pub fn traceback(&self) -> Option<&Traceback> {
        self.traceback.as_ref()
    }

    /// Sets `__cause__`, which also sets `__suppress_context__` as `raise ... from ...` does.
    pub fn set_cause(&mut self, cause: Option<Self>) {
        self.cause = cause.map(Box::new);
        self.suppress_context = true;
    }

    pub fn set_context(&mut self, context: Option<Self>) {
        self.context = context.map(Box::new);
    }

    pub(crate) fn set_traceback(&mut self, traceback: Option<Traceback>) {
        self.traceback = traceback;
    }
}

impl Display for ExceptionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "{}: {msg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

/// The value half of an exception-preservation record.
///
/// Until normalization the value may be absent or a bare message; afterwards it is always an
/// instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExcValue {
    Empty,
    Message(String),
    Instance(Box<ExceptionInstance>),
}

/// An exception in flight: (type, value, traceback).
///
/// Dialects with lazily-normalized exception state keep the three parts separate; the newest
/// exception model stores records already normalized, so the record is effectively just the
/// instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    exc_type: ExcType,
    value: ExcValue,
    traceback: Option<Traceback>,
}

impl ExceptionRecord {
    #[must_use]
    pub fn new(exc_type: ExcType, value: ExcValue) -> Self {
        Self {
            exc_type,
            value,
            traceback: None,
        }
    }

    #[must_use]
    pub fn new_msg(exc_type: ExcType, msg: impl Into<String>) -> Self {
        Self::new(exc_type, ExcValue::Message(msg.into()))
    }

    #[must_use]
    pub fn empty(exc_type: ExcType) -> Self {
        Self::new(exc_type, ExcValue::Empty)
    }

    #[must_use]
    pub fn from_instance(instance: ExceptionInstance) -> Self {
        Self::new(instance.exc_type, ExcValue::Instance(Box::new(instance)))
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn value(&self) -> &ExcValue {
        &self.value
    }

    #[must_use]
    pub fn traceback(&self) -> Option<&Traceback> {
        self.traceback.as_ref()
    }

    #[must_use]
    pub fn with_traceback(mut self, traceback: Traceback) -> Self {
        self.traceback = Some(traceback);
        self
    }

    /// Appends a frame to the record's traceback, creating it if needed.
    pub fn push_frame(&mut self, function: impl Into<String>, line: u32) {
        self.traceback.get_or_insert_with(Traceback::new).push(function, line);
    }

    #[must_use]
    pub fn is_normalized(&self) -> bool {
        matches!(self.value, ExcValue::Instance(_))
    }

    /// Whether an `except exc_type:` clause would catch this exception.
    #[must_use]
    pub fn matches(&self, exc_type: ExcType) -> bool {
        self.exc_type.is_subclass_of(exc_type)
    }

    #[must_use]
    pub fn message(&self) -> Option<String> {
        match &self.value {
            ExcValue::Empty => None,
            ExcValue::Message(msg) => Some(msg.clone()),
            ExcValue::Instance(instance) => instance.message(),
        }
    }

    #[must_use]
    pub fn instance(&self) -> Option<&ExceptionInstance> {
        match &self.value {
            ExcValue::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Turns the value into an instance of the record's type.
    ///
    /// An instance of a subclass keeps its class and the record's type is updated to match.
    /// An instance of an unrelated class becomes the single argument of a fresh instance.
    pub fn normalize(&mut self) {
        let value = std::mem::replace(&mut self.value, ExcValue::Empty);
        let instance = match value {
            ExcValue::Empty => ExceptionInstance::new(self.exc_type, Vec::new()),
            ExcValue::Message(msg) => ExceptionInstance::with_message(self.exc_type, msg),
            ExcValue::Instance(instance) if instance.exc_type.is_subclass_of(self.exc_type) => {
                self.exc_type = instance.exc_type;
                *instance
            }
            ExcValue::Instance(instance) => {
                let arg = instance.message().unwrap_or_else(|| instance.exc_type.to_string());
                ExceptionInstance::with_message(self.exc_type, arg)
            }
        };
        self.value = ExcValue::Instance(Box::new(instance));
    }

    /// Normalizes the record and folds the traceback into the instance.
    #[must_use]
    pub fn into_instance(mut self) -> ExceptionInstance {
        self.normalize();
        let traceback = self.traceback.take();
        match self.value {
            ExcValue::Instance(mut instance) => {
                if traceback.is_some() {
                    instance.set_traceback(traceback);
                }
                *instance
            }
            ExcValue::Empty | ExcValue::Message(_) => unreachable!("normalize always produces an instance"),
        }
    }

    pub(crate) fn instance_mut(&mut self) -> &mut ExceptionInstance {
        self.normalize();
        match &mut self.value {
            ExcValue::Instance(instance) => instance,
            ExcValue::Empty | ExcValue::Message(_) => unreachable!("normalize always produces an instance"),
        }
    }
}

impl Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "{}: {msg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

/// Runtime error types that can occur during operator dispatch.
///
/// Three variants:
/// - `Internal`: Bug in the runtime implementation (surfaced as `RuntimeError` at the boundary)
/// - `Exc`: Catchable exception (TypeError, ZeroDivisionError, ...)
/// - `UncatchableExc`: Resource limit exceeded, cannot be caught by compiled `except` clauses
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Internal(Cow<'static, str>),
    Exc(Box<ExceptionRecord>),
    UncatchableExc(Box<ExceptionRecord>),
}

impl RunError {
    #[must_use]
    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// The exception type this error is raised as.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::Internal(_) => ExcType::RuntimeError,
            Self::Exc(record) | Self::UncatchableExc(record) => record.exc_type(),
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Internal(msg) => Some(format!("internal error: {msg}")),
            Self::Exc(record) | Self::UncatchableExc(record) => record.message(),
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&ExceptionRecord> {
        match self {
            Self::Internal(_) => None,
            Self::Exc(record) | Self::UncatchableExc(record) => Some(record),
        }
    }

    #[must_use]
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::Exc(_))
    }

    /// Converts the error into the record stored as the pending exception.
    #[must_use]
    pub fn into_record(self) -> ExceptionRecord {
        match self {
            Self::Internal(msg) => ExceptionRecord::new_msg(ExcType::RuntimeError, format!("internal error: {msg}")),
            Self::Exc(record) | Self::UncatchableExc(record) => *record,
        }
    }
}

impl From<ExceptionRecord> for RunError {
    fn from(record: ExceptionRecord) -> Self {
        Self::Exc(Box::new(record))
    }
}

impl From<ExceptionInstance> for RunError {
    fn from(instance: ExceptionInstance) -> Self {
        Self::Exc(Box::new(ExceptionRecord::from_instance(instance)))
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Exc(record) | Self::UncatchableExc(record) => write!(f, "{record}"),
        }
    }
}

impl std::error::Error for RunError {}
