//! Error types for the runtime boundary.
//!
//! Every failure a native function can observe is a [`ScriptError`] returned
//! through `Result`. Errors propagate with `?` up to the nearest protected
//! call ([`State::pcall`](crate::State::pcall)) or out to the host; nothing in
//! this crate catches them on the way.
//!
//! ```text
//! ScriptError
//! ├── Type             - argument has the wrong kind
//! ├── Argument         - argument fails a shape/bounds precondition
//! ├── Runtime          - message raised by a native function
//! ├── Operation        - index/call on a value that does not support it
//! ├── UnregisteredType - instance requested for an unknown type name
//! ├── StackOverflow    - stack or call depth limit reached
//! └── InvalidIndex     - stack index outside the current frame
//! ```

use thiserror::Error;

/// Result alias used throughout the runtime boundary.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors that can occur when converting a stack value into a Rust value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has a different kind than the target type accepts.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The number does not fit the target integer type.
    #[error("number {value} has no {target_type} representation")]
    IntegerOverflow { value: f64, target_type: &'static str },
}

/// Errors raised at the native/script boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// A value at an argument position does not have the requested kind.
    #[error("bad argument #{position} to '{function}' ({expected} expected, got {actual})")]
    Type {
        position: i32,
        function: String,
        expected: String,
        actual: &'static str,
    },

    /// An argument fails a precondition other than its kind.
    #[error("bad argument #{position} to '{function}' ({message})")]
    Argument {
        position: i32,
        function: String,
        message: String,
    },

    /// Free-form error raised by a native function.
    #[error("{message}")]
    Runtime { message: String },

    /// An operation was attempted on a value that does not support it.
    #[error("attempt to {op} a {kind} value")]
    Operation { op: &'static str, kind: &'static str },

    /// An instance was requested for a type name that was never registered.
    #[error("userdata type '{name}' is not registered")]
    UnregisteredType { name: String },

    /// The stack or the native call depth exceeded its configured limit.
    #[error("stack overflow ({message})")]
    StackOverflow { message: String },

    /// A stack index does not address a slot of the current frame.
    #[error("invalid stack index {index}")]
    InvalidIndex { index: i32 },
}

impl ScriptError {
    /// Create a free-form runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
        }
    }

    /// Create a stack overflow error.
    pub fn stack_overflow(message: impl Into<String>) -> Self {
        ScriptError::StackOverflow {
            message: message.into(),
        }
    }

    /// True for argument kind mismatches.
    pub fn is_type_error(&self) -> bool {
        matches!(self, ScriptError::Type { .. })
    }

    /// True for argument precondition failures.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, ScriptError::Argument { .. })
    }

    /// The argument position this error refers to, if any.
    pub fn position(&self) -> Option<i32> {
        match self {
            ScriptError::Type { position, .. } | ScriptError::Argument { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_error_names_position_and_kinds() {
        let err = ScriptError::Type {
            position: 2,
            function: "length".into(),
            expected: "Point".into(),
            actual: "number",
        };
        assert_eq!(
            err.to_string(),
            "bad argument #2 to 'length' (Point expected, got number)"
        );
        assert!(err.is_type_error());
        assert!(!err.is_argument_error());
        assert_eq!(err.position(), Some(2));
    }

    #[test]
    fn argument_error_message() {
        let err = ScriptError::Argument {
            position: 1,
            function: "?".into(),
            message: "size must be positive".into(),
        };
        assert!(err.to_string().contains("#1"));
        assert!(err.to_string().contains("size must be positive"));
        assert!(err.is_argument_error());
    }

    #[test]
    fn runtime_error_is_verbatim() {
        let err = ScriptError::runtime("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.position(), None);
    }

    #[test]
    fn operation_error() {
        let err = ScriptError::Operation {
            op: "index",
            kind: "number",
        };
        assert_eq!(err.to_string(), "attempt to index a number value");
    }

    #[test]
    fn unregistered_type_error() {
        let err = ScriptError::UnregisteredType {
            name: "Vector".into(),
        };
        assert!(err.to_string().contains("Vector"));
    }

    #[test]
    fn conversion_error_messages() {
        let err = ConversionError::TypeMismatch {
            expected: "number",
            actual: "table",
        };
        assert!(err.to_string().contains("number"));
        assert!(err.to_string().contains("table"));

        let err = ConversionError::IntegerOverflow {
            value: 300.0,
            target_type: "u8",
        };
        assert!(err.to_string().contains("u8"));
    }
}
