use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type ExprResult<T> = Result<T, ExprError>;

/// Errors raised while compiling or evaluating an expression.
///
/// The taxonomy has three tiers:
/// - user-input errors (bad arity, bad types, bad unit strings, out-of-range
///   values, overflow), reportable and never silently recovered;
/// - wrapped library errors ([`ExprError::Library`]), raised when a
///   date-time or regex library rejected an operation; callers never see
///   the library's own error types;
/// - fatal errors ([`ExprError::Internal`]), implementation defects such as
///   accessing the wrong callable of an evaluator. These are not expected to
///   be caught by ordinary call sites.
///
/// Type and arity errors are raised at compile time; unit, range and
/// overflow errors only at evaluation time, since they depend on runtime
/// values. Missing values are not errors and never surface here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("wrong number of arguments for '{function}': expected {expected}, got {actual}")]
    WrongArity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("wrong type of argument {position} of '{function}': expected {expected}")]
    WrongType {
        function: String,
        position: usize,
        expected: String,
    },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("invalid unit '{unit}' for '{function}'")]
    InvalidUnit { function: String, unit: String },

    #[error("invalid time zone '{zone}' for '{function}'")]
    InvalidTimeZone { function: String, zone: String },

    #[error("value {value} out of range for unit '{unit}' of '{function}': expected {min}..={max}")]
    OutOfRange {
        function: String,
        unit: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("numeric overflow in '{function}'")]
    NumericOverflow { function: String },

    #[error("'{function}': {message}")]
    Library { function: String, message: String },

    /// Evaluation was cancelled through the context's stop checker.
    #[error("evaluation stopped")]
    Stopped,

    /// An implementation defect, not bad user input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExprError {
    /// `true` for errors caused by user input (a malformed expression or
    /// out-of-domain runtime value), `false` for fatal/internal defects and
    /// cancellation.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ExprError::Internal(_) | ExprError::Stopped)
    }

    pub(crate) fn library(function: &str, message: impl ToString) -> Self {
        ExprError::Library {
            function: function.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        ExprError::Internal(message.into())
    }
}
