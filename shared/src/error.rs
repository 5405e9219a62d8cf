//! Error classification shared by every crate in the workspace.
//!
//! Each crate keeps its own error enum; implementing [`Classify`] gives callers
//! an explicit [`ErrorKind`] to branch on instead of matching on messages.

use http::StatusCode;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No such entity. Callers branch on this (create-vs-update, absent-but-not-fatal).
    NotFound,
    /// Structurally invalid event, identifier or request.
    MalformedInput,
    /// Failure of an external lookup or store.
    Upstream,
    /// Caller input failed a business rule.
    Validation,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MalformedInput | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Classify {
    fn kind(&self) -> ErrorKind;

    /// Optional machine-readable code, more specific than the kind.
    fn code(&self) -> Option<&'static str> {
        None
    }

    fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
