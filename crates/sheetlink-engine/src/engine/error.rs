//! Resolution outcomes that are not values.
//!
//! Every variant is a sentinel: it is returned, never thrown, and its
//! `Display` form is the glyph a renderer shows in place of a value.

use thiserror::Error;

/// Why a cell could not be resolved to a value.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced cell is unresolvable, missing, or on an unknown sheet.
    #[error("#REF!")]
    Ref,
    /// A reference chain revisits a cell that is still being resolved.
    #[error("#CIRCULAR!")]
    CircularDependency,
    /// A dynamic variable token has no value.
    #[error("#VARIABLE!")]
    DynamicVariable,
    /// A dynamic variable value is still pending; retry on the next read.
    #[error("#RESOLVING")]
    DynamicVariableResolving,
    #[error("#ERROR")]
    General,
    #[error("#VALUE!")]
    Value,
    #[error("#DIV/0!")]
    DivZero,
    #[error("#NAME?")]
    Name,
    #[error("#NUM!")]
    Num,
    #[error("#N/A")]
    NotAvailable,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Ref,
        ErrorKind::CircularDependency,
        ErrorKind::DynamicVariable,
        ErrorKind::DynamicVariableResolving,
        ErrorKind::General,
        ErrorKind::Value,
        ErrorKind::DivZero,
        ErrorKind::Name,
        ErrorKind::Num,
        ErrorKind::NotAvailable,
    ];

    /// The glyph for this error.
    pub fn sentinel(&self) -> &'static str {
        match self {
            ErrorKind::Ref => "#REF!",
            ErrorKind::CircularDependency => "#CIRCULAR!",
            ErrorKind::DynamicVariable => "#VARIABLE!",
            ErrorKind::DynamicVariableResolving => "#RESOLVING",
            ErrorKind::General => "#ERROR",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::DivZero => "#DIV/0!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NotAvailable => "#N/A",
        }
    }

    pub fn from_sentinel(text: &str) -> Option<ErrorKind> {
        Self::ALL.into_iter().find(|kind| kind.sentinel() == text)
    }

    /// Pending is "not yet a value", not a failure: callers retry instead of
    /// showing an error glyph.
    pub fn is_pending(&self) -> bool {
        matches!(self, ErrorKind::DynamicVariableResolving)
    }

    /// Which error wins when several are found in one formula. Lower wins.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            ErrorKind::Ref => 0,
            ErrorKind::CircularDependency => 1,
            ErrorKind::DynamicVariableResolving => 2,
            ErrorKind::DynamicVariable => 3,
            _ => 4,
        }
    }
}

/// Error literals a formula may contain as plain text (never variable tokens).
pub const ERROR_LITERALS: &[&str] = &[
    "#REF!", "#N/A", "#VALUE!", "#DIV/0!", "#NAME?", "#NUM!", "#NULL!", "#ERROR",
];

/// Errors reported by an [`Evaluator`](super::Evaluator).
#[derive(Error, Clone, Debug, PartialEq)]
pub enum EvalError {
    #[error("type mismatch: {0}")]
    Value(String),
    #[error("division by zero")]
    DivZero,
    #[error("unknown name: {0}")]
    Name(String),
    #[error("invalid numeric result")]
    Num,
    #[error("value not available")]
    NotAvailable,
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("{0}")]
    Other(String),
}

impl From<EvalError> for ErrorKind {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Value(_) => ErrorKind::Value,
            EvalError::DivZero => ErrorKind::DivZero,
            EvalError::Name(_) => ErrorKind::Name,
            EvalError::Num => ErrorKind::Num,
            EvalError::NotAvailable => ErrorKind::NotAvailable,
            EvalError::Syntax(_) | EvalError::Other(_) => ErrorKind::General,
        }
    }
}
