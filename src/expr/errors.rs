//! Expression error types
//!
//! Error codes:
//! - DQ_EXPR_SYNTAX (REJECT)
//! - DQ_EXPR_EVALUATION (ERROR)

use thiserror::Error;

/// Result type for expression parsing and evaluation
pub type ExprResult<T> = Result<T, ExprError>;

/// Expression errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Expression text could not be parsed
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Unknown function name
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of function arguments
    #[error("Function {name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Evaluation failed
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl ExprError {
    /// Create a syntax error
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        ExprError::Evaluation(message.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ExprError::Syntax { .. } => "DQ_EXPR_SYNTAX",
            ExprError::UnknownFunction(_) | ExprError::Arity { .. } | ExprError::Evaluation(_) => {
                "DQ_EXPR_EVALUATION"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExprError::syntax(3, "unexpected").code(), "DQ_EXPR_SYNTAX");
        assert_eq!(
            ExprError::UnknownFunction("foo".into()).code(),
            "DQ_EXPR_EVALUATION"
        );
    }

    #[test]
    fn test_syntax_display() {
        let err = ExprError::syntax(7, "expected ')'");
        assert_eq!(err.to_string(), "Syntax error at position 7: expected ')'");
    }
}
