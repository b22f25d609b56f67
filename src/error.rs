// ABOUTME: Error types for reading and evaluating S-expressions

use thiserror::Error;

/// Errors surfaced by the evaluation engine.
///
/// `CallError` wraps a downstream failure with the name of the callable it
/// escaped from; wrapping is applied at most once (a `CallError` is never
/// re-wrapped), so deeply nested calls report the innermost frame only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("symbol not bound in {frame}: {symbol}")]
    NotBound { frame: String, symbol: String },

    #[error("object is not callable: {0}")]
    NotCallable(String),

    #[error("error in call to {name}: {inner}")]
    CallError {
        name: String,
        inner: Box<EvalError>,
    },

    #[error("improper list")]
    ImproperList,

    #[error("binding is frozen: {0}")]
    Frozen(String),

    #[error("cannot rebind constant: {0}")]
    ConstBinding(String),

    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    #[error("expression cannot be compiled")]
    MissingCompile,

    #[error("nesting limit of {0} exceeded")]
    NestingLimit(usize),

    #[error("step limit of {0} exceeded")]
    StepsLimit(u64),

    #[error("time limit exceeded")]
    TimeLimit,

    /// Parse-time problem with a form, e.g. a malformed `let` binding list.
    #[error("{form}: {message}")]
    Syntax { form: String, message: String },

    /// Runtime problem reported by a builtin, e.g. division by zero.
    #[error("{function}: {message}")]
    RuntimeError { function: String, message: String },
}

impl EvalError {
    pub fn not_bound(frame: &str, symbol: &str) -> Self {
        EvalError::NotBound {
            frame: frame.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        EvalError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn type_mismatch(function: &str, expected: &str, actual: &str, position: usize) -> Self {
        EvalError::TypeMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            position,
        }
    }

    pub fn runtime(function: &str, message: impl Into<String>) -> Self {
        EvalError::RuntimeError {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn syntax(form: &str, message: impl Into<String>) -> Self {
        EvalError::Syntax {
            form: form.to_string(),
            message: message.into(),
        }
    }

    /// Wrap in a `CallError` naming `name`, unless already wrapped.
    pub fn wrap(self, name: &str) -> Self {
        match self {
            err @ EvalError::CallError { .. } => err,
            inner => EvalError::CallError {
                name: name.to_string(),
                inner: Box::new(inner),
            },
        }
    }
}

/// Errors produced by the textual reader.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected character: {0:?}")]
    UnexpectedChar(char),

    #[error("'#' is reserved")]
    Reserved,

    #[error("nesting deeper than {0}")]
    DepthLimit(usize),

    #[error("list longer than {0}")]
    LengthLimit(usize),

    #[error("integer out of range: {0}")]
    IntOutOfRange(String),

    #[error("bad escape sequence: {0}")]
    BadEscape(String),

    #[error("misplaced dot")]
    StrayDot,

    #[error("unterminated string")]
    UnterminatedString,

    #[error("trailing input: {0}")]
    TrailingInput(String),
}

impl From<ReadError> for EvalError {
    fn from(err: ReadError) -> Self {
        EvalError::syntax("read", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message_pluralization() {
        let one = EvalError::arity("car", "1", 2);
        assert_eq!(one.to_string(), "car: expected 1 argument, got 2");

        let two = EvalError::arity("cons", "2", 1);
        assert_eq!(two.to_string(), "cons: expected 2 arguments, got 1");
    }

    #[test]
    fn test_call_error_wraps_once() {
        let inner = EvalError::runtime("/", "division by zero");
        let wrapped = inner.wrap("/");
        let rewrapped = wrapped.clone().wrap("outer");
        assert_eq!(wrapped, rewrapped);
    }

    #[test]
    fn test_read_error_converts_to_syntax() {
        let err: EvalError = ReadError::Reserved.into();
        assert!(matches!(err, EvalError::Syntax { .. }));
    }
}
