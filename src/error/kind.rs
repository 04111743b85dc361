//! Error classification kinds.
//!
//! Every [`Error`](super::Error) carries one [`ErrorKind`]. The set is closed, so
//! the kind → HTTP status table below is checked for exhaustiveness by the
//! compiler.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;

/// Classification of an error, independent of where it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorKind {
    /// Unclassified error. This is the unset value.
    #[default]
    Other,
    /// Invalid operation for this type of item.
    Invalid,
    /// External I/O error such as a network failure.
    Io,
    /// Item already exists.
    Exist,
    /// Item does not exist.
    NotExist,
    /// Information withheld.
    Private,
    /// Internal error or inconsistency.
    Internal,
    /// Link target does not exist.
    BrokenLink,
    /// Error from the relational store.
    Database,
    /// Input validation error.
    Validation,
    /// Unanticipated error.
    Unanticipated,
    /// Invalid request (malformed body, bad headers).
    InvalidRequest,
    /// Permission denied.
    Permission,
    /// Request is missing valid credentials.
    Unauthenticated,
    /// Authenticated caller lacks access to the resource.
    Unauthorized,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::Other,
        ErrorKind::Invalid,
        ErrorKind::Io,
        ErrorKind::Exist,
        ErrorKind::NotExist,
        ErrorKind::Private,
        ErrorKind::Internal,
        ErrorKind::BrokenLink,
        ErrorKind::Database,
        ErrorKind::Validation,
        ErrorKind::Unanticipated,
        ErrorKind::InvalidRequest,
        ErrorKind::Permission,
        ErrorKind::Unauthenticated,
        ErrorKind::Unauthorized,
    ];

    /// Stable machine-readable name, used in responses and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Other => "other",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Io => "io",
            ErrorKind::Exist => "exist",
            ErrorKind::NotExist => "not_exist",
            ErrorKind::Private => "private",
            ErrorKind::Internal => "internal",
            ErrorKind::BrokenLink => "broken_link",
            ErrorKind::Database => "database",
            ErrorKind::Validation => "validation",
            ErrorKind::Unanticipated => "unanticipated",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Permission => "permission",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
        }
    }

    /// Human-readable description, used as the message of an error that has
    /// no other text.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Other => "other error",
            ErrorKind::Invalid => "invalid operation",
            ErrorKind::Io => "I/O error",
            ErrorKind::Exist => "item already exists",
            ErrorKind::NotExist => "item does not exist",
            ErrorKind::Private => "information withheld",
            ErrorKind::Internal => "internal error",
            ErrorKind::BrokenLink => "link target does not exist",
            ErrorKind::Database => "database error",
            ErrorKind::Validation => "input validation error",
            ErrorKind::Unanticipated => "unanticipated error",
            ErrorKind::InvalidRequest => "invalid request error",
            ErrorKind::Permission => "permission denied",
            ErrorKind::Unauthenticated => "unauthenticated request",
            ErrorKind::Unauthorized => "unauthorized request",
        }
    }

    /// Default transport status for this kind.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Invalid
            | ErrorKind::Validation
            | ErrorKind::InvalidRequest
            | ErrorKind::BrokenLink => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Permission | ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::NotExist | ErrorKind::Private => StatusCode::NOT_FOUND,
            ErrorKind::Exist => StatusCode::CONFLICT,
            ErrorKind::Other
            | ErrorKind::Io
            | ErrorKind::Internal
            | ErrorKind::Database
            | ErrorKind::Unanticipated => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether details (message, code, parameter) of this kind may be shown to
    /// an untrusted caller.
    pub fn is_client_facing(self) -> bool {
        !self.status().is_server_error()
    }

    /// Parse a machine-readable name back into a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
