//! Error types for ee-expr.

use crate::HandleKind;
use thiserror::Error;

/// Errors that can occur while decoding a serialized expression or handle.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The token was empty or contained only whitespace.
    #[error("empty expression token")]
    Empty,

    /// The token is not a valid expression document.
    #[error("malformed expression: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A value or function body references a key missing from the value table.
    #[error("dangling value reference '{0}'")]
    DanglingReference(String),

    /// A value reference (transitively) refers back to itself.
    #[error("cyclic value reference '{0}'")]
    CyclicReference(String),

    /// The expression tree is nested deeper than [`crate::MAX_DEPTH`].
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),

    /// The expression expands to more than [`crate::MAX_NODES`] nodes.
    #[error("expression expands to more than {0} nodes")]
    TooLarge(usize),

    /// The root of the expression is not a function invocation.
    #[error("expression root is not a function invocation")]
    NotAnInvocation,

    /// The root function is not part of any known family.
    #[error("cannot infer object kind from function '{0}'")]
    UnknownFunction(String),

    /// The root function yields an object that cannot be passed as a handle.
    #[error("function '{function}' yields {produces}, which is not a supported handle kind")]
    UnsupportedKind {
        /// Root function name.
        function: String,
        /// What the function produces.
        produces: &'static str,
    },

    /// The handle decodes to a different kind than the one requested.
    #[error("expected {expected} handle, got {actual}")]
    KindMismatch {
        /// Kind the caller asked for.
        expected: HandleKind,
        /// Kind the token decodes to.
        actual: HandleKind,
    },
}

impl CodecError {
    /// Create an unsupported-kind error.
    pub fn unsupported(function: impl Into<String>, produces: &'static str) -> Self {
        CodecError::UnsupportedKind {
            function: function.into(),
            produces,
        }
    }
}

/// A string literal that is not a member of an enumerated parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {what} '{literal}' (expected one of: {})", .expected.join(", "))]
pub struct ParseLiteralError {
    /// Name of the enumeration (e.g. "comparison").
    pub what: &'static str,
    /// The rejected literal.
    pub literal: String,
    /// Accepted literals.
    pub expected: &'static [&'static str],
}
