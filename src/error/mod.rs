//! Structured, classifiable errors.
//!
//! An [`Error`] carries an [`ErrorKind`], an optional stable [`Code`], an
//! optional [`Parameter`] naming the offending input, an optional message and
//! an optional cause. Wrapping produces a new value; the cause chain is walked
//! outermost-first through [`std::error::Error::source`], so foreign errors
//! (driver, I/O, decoder) sit in the same chain as structured ones.
//!
//! An error with nothing in it (kind `Other`, no code, no parameter, no
//! message and no cause) is a programming mistake; building one panics.

pub mod kind;
pub mod response;

pub use kind::ErrorKind;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Cause stored inside an [`Error`].
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Short stable token for programmatic matching, e.g. `nil_tx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(String);

impl Code {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Code {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Code {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Name of the field or parameter an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter(String);

impl Parameter {
    pub fn new(param: impl Into<String>) -> Self {
        Self(param.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Parameter {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The structured error value.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    code: Option<Code>,
    param: Option<Parameter>,
    message: Option<String>,
    cause: Option<Cause>,
}

impl Error {
    fn empty() -> Self {
        Self {
            kind: ErrorKind::Other,
            code: None,
            param: None,
            message: None,
            cause: None,
        }
    }

    /// Create an error of the given kind with a message.
    ///
    /// # Panics
    ///
    /// If `kind` is `Other` and `message` is empty.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: non_empty(message.into()),
            ..Self::empty()
        }
        .informative()
    }

    /// Create an unclassified error from a message.
    ///
    /// # Panics
    ///
    /// If `message` is empty.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Wrap an underlying error. Kind and code of a wrapped [`Error`] stay
    /// visible through [`Error::kind`] and [`Error::code`].
    pub fn wrap<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            cause: Some(Arc::new(cause)),
            ..Self::empty()
        }
    }

    /// Create an `Internal` error with a code and message.
    pub fn internal(code: impl Into<Code>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message).with_code(code)
    }

    /// Create a `Validation` error naming the offending parameter.
    pub fn validation(param: impl Into<Parameter>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message).with_param(param)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self.informative()
    }

    pub fn with_code(mut self, code: impl Into<Code>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_param(mut self, param: impl Into<Parameter>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = non_empty(message.into());
        self.informative()
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Kind of the first error in the chain that sets one, or `Other`.
    pub fn kind(&self) -> ErrorKind {
        kind_of(self)
    }

    /// Code of the first error in the chain that sets one.
    pub fn code(&self) -> Option<&Code> {
        code_of(self)
    }

    /// Parameter of the first error in the chain that sets one.
    pub fn param(&self) -> Option<&Parameter> {
        self.structured_chain().find_map(|e| e.param.as_ref())
    }

    /// Human-readable text: the supplied message, or else the message of the
    /// innermost cause, or else the kind's description.
    pub fn message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match &self.cause {
            Some(cause) => match cause.downcast_ref::<Error>() {
                Some(inner) => inner.message(),
                None => cause.to_string(),
            },
            None => self.kind.description().to_string(),
        }
    }

    /// The immediate cause.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Iterate over this error and its causes, outermost first.
    pub fn chain(&self) -> Chain<'_> {
        Chain::new(self)
    }

    /// Whether `target` appears anywhere in the chain.
    pub fn chain_contains(&self, target: &Error) -> bool {
        self.structured_chain().any(|e| e == target)
    }

    /// Whether this error, used as a template, matches `actual`.
    ///
    /// Fields left unset on the template are wildcards; fields it sets must be
    /// equal on `actual`. Messages compare as returned by [`Error::message`].
    /// A template cause is matched recursively when both causes are
    /// structured, otherwise by display text.
    pub fn matches(&self, actual: &Error) -> bool {
        if self.kind != ErrorKind::Other && self.kind != actual.kind {
            return false;
        }
        if self.code.is_some() && self.code != actual.code {
            return false;
        }
        if self.param.is_some() && self.param != actual.param {
            return false;
        }
        if self.message.is_some() && self.message() != actual.message() {
            return false;
        }
        let Some(want) = &self.cause else {
            return true;
        };
        match want.downcast_ref::<Error>() {
            Some(want) => actual
                .cause
                .as_ref()
                .and_then(|got| got.downcast_ref::<Error>())
                .is_some_and(|got| want.matches(got)),
            // A foreign cause on the template stands for text: either the
            // actual cause's text or the actual message.
            None => {
                let text = want.to_string();
                actual.message() == text
                    || actual.cause.as_ref().is_some_and(|got| got.to_string() == text)
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.kind == ErrorKind::Other
            && self.code.is_none()
            && self.param.is_none()
            && self.message.is_none()
            && self.cause.is_none()
    }

    #[track_caller]
    fn informative(self) -> Self {
        assert!(!self.is_empty(), "error must carry a kind, code, parameter, message or cause");
        self
    }

    fn structured_chain(&self) -> impl Iterator<Item = &Error> {
        self.chain().filter_map(|e| e.downcast_ref::<Error>())
    }
}

/// Free-function form of [`Error::matches`].
pub fn matches(template: &Error, actual: &Error) -> bool {
    template.matches(actual)
}

/// Classify any error: the first kind set by a structured error in its
/// chain, or `Other`.
pub fn kind_of(err: &(dyn StdError + 'static)) -> ErrorKind {
    Chain::new(err)
        .filter_map(|e| e.downcast_ref::<Error>())
        .map(|e| e.kind)
        .find(|kind| *kind != ErrorKind::Other)
        .unwrap_or_default()
}

/// The first code set by a structured error in the chain of `err`.
pub fn code_of<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Code> {
    Chain::new(err)
        .filter_map(|e| e.downcast_ref::<Error>())
        .find_map(|e| e.code.as_ref())
}

/// Iterator over an error and its causes, outermost first. Call
/// [`Error::chain`] again for a fresh walk.
#[derive(Clone)]
pub struct Chain<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> Chain<'a> {
    pub fn new(head: &'a (dyn StdError + 'static)) -> Self {
        Self { next: Some(head) }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.source();
        Some(current)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), Some(cause)) => write!(f, "{}: {}", message, cause),
            (Some(message), None) => f.write_str(message),
            (None, Some(cause)) => write!(f, "{}", cause),
            (None, None) => f.write_str(self.kind.description()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.code == other.code
            && self.param == other.param
            && self.message == other.message
            && match (&self.cause, &other.cause) {
                (None, None) => true,
                (Some(a), Some(b)) => {
                    Arc::ptr_eq(a, b)
                        || match (a.downcast_ref::<Error>(), b.downcast_ref::<Error>()) {
                            (Some(a), Some(b)) => a == b,
                            (None, None) => a.to_string() == b.to_string(),
                            _ => false,
                        }
                }
                _ => false,
            }
    }
}

fn non_empty(message: String) -> Option<String> {
    (!message.is_empty()).then_some(message)
}

/// # Panics
///
/// For `ErrorKind::Other`, which carries no information.
impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            ..Self::empty()
        }
        .informative()
    }
}

/// Classify driver errors. The driver error always stays in the chain.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind as DbErrorKind;

        let classified = match &err {
            sqlx::Error::RowNotFound => Error::new(ErrorKind::NotExist, "record not found"),
            // Client-facing kinds get fixed text so driver details stay in the
            // chain and out of response bodies.
            sqlx::Error::Database(db_err) => match db_err.kind() {
                DbErrorKind::UniqueViolation => {
                    Error::new(ErrorKind::Exist, "item already exists").with_code("unique_violation")
                }
                DbErrorKind::ForeignKeyViolation => {
                    Error::new(ErrorKind::Validation, "referenced item does not exist")
                        .with_code("foreign_key_violation")
                }
                DbErrorKind::NotNullViolation => {
                    Error::new(ErrorKind::Validation, "required value is missing")
                        .with_code("not_null_violation")
                }
                DbErrorKind::CheckViolation => {
                    Error::new(ErrorKind::Validation, "value failed a check constraint")
                        .with_code("check_violation")
                }
                _ => Error::from(ErrorKind::Database),
            },
            sqlx::Error::PoolTimedOut => Error::from(ErrorKind::Database).with_code("pool_timeout"),
            sqlx::Error::PoolClosed => Error::from(ErrorKind::Database).with_code("pool_closed"),
            sqlx::Error::Io(_) => Error::from(ErrorKind::Io),
            _ => Error::from(ErrorKind::Database),
        };
        classified.with_cause(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::wrap(err).with_kind(ErrorKind::Io)
    }
}
