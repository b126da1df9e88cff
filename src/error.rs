//! Error taxonomy shared by the router and every service.
//!
//! Route handlers never panic and never propagate a Rust `Result` across the
//! event-loop boundary; they always reply with either `data` or `err`. This
//! module is the vocabulary that `err` is built from.

use serde_json::{Value, json};
use std::fmt;

/// The kinds of failure a route can report, per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFoundError,
    BadRequestError,
    RangeError,
    NotSupportedError,
    AbortError,
    InternalError,
    ErrnoError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::BadRequestError => "BadRequestError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::NotSupportedError => "NotSupportedError",
            ErrorKind::AbortError => "AbortError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::ErrnoError => "ErrnoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `code` nested in an `ErrnoError`: either a negated errno, or a
/// symbolic constant like `"ETIMEDOUT"` for conditions that don't map to a
/// single OS error code (e.g. an `exec` timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Errno(i32),
    Symbol(&'static str),
}

impl From<ErrorCode> for Value {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Errno(n) => json!(n),
            ErrorCode::Symbol(s) => json!(s),
        }
    }
}

/// A route-level error: a `type` from the taxonomy plus a human message.
#[derive(Debug, Clone)]
pub struct RouteError {
    pub kind: ErrorKind,
    pub message: String,
    /// Present only for `ErrnoError`.
    pub code: Option<ErrorCode>,
}

impl RouteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFoundError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequestError, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupportedError, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AbortError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Maps a negative backend return code to an `ErrnoError`, the way the
    /// I/O backend's `-errno` results are mapped at the router boundary.
    pub fn from_errno(errno: i32) -> Self {
        let message = std::io::Error::from_raw_os_error(errno).to_string();
        Self {
            kind: ErrorKind::ErrnoError,
            message,
            code: Some(ErrorCode::Errno(-errno)),
        }
    }

    /// An `ErrnoError` carrying a symbolic code, e.g. `"ETIMEDOUT"` for a
    /// `child_process.exec` that exceeded its `timeout`.
    pub fn timed_out(symbol: &'static str) -> Self {
        Self {
            kind: ErrorKind::ErrnoError,
            message: "operation timed out".to_string(),
            code: Some(ErrorCode::Symbol(symbol)),
        }
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::bad_request(format!("Expecting '{name}' in parameters"))
    }

    pub fn invalid_parameter(name: &str) -> Self {
        Self::bad_request(format!("Invalid '{name}' given in parameters"))
    }

    /// Renders the `{type, message}` (or `{type, message, code}`) object that
    /// is nested under `err` in the wire Result.
    pub fn to_json(&self) -> Value {
        match &self.code {
            Some(code) => json!({
                "type": self.kind.as_str(),
                "message": self.message,
                "code": Value::from(code.clone()),
            }),
            None => json!({
                "type": self.kind.as_str(),
                "message": self.message,
            }),
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RouteError {}

impl From<std::io::Error> for RouteError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::from_errno(errno),
            None => Self::internal(err.to_string()),
        }
    }
}

impl From<Error> for RouteError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidWindowIndex(i) => Self::not_found(format!("invalid window index: {i}")),
            Error::WindowTableFull => Self::internal("no free window slot available"),
            Error::RuntimeAlreadyShutdown => Self::internal("runtime has already shut down"),
            Error::InvalidConfig(msg) => Self::not_supported(msg),
        }
    }
}

/// Top-level crate error: construction/configuration failures that happen
/// before a router even exists. Kept as a hand-rolled enum, matching the
/// teacher's `enum Error` + manual `Display`/`std::error::Error` style
/// rather than a `thiserror` derive.
#[derive(Debug)]
pub enum Error {
    InvalidConfig(String),
    RuntimeAlreadyShutdown,
    WindowTableFull,
    InvalidWindowIndex(i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::RuntimeAlreadyShutdown => write!(f, "runtime has already shut down"),
            Error::WindowTableFull => write!(f, "no free window slot available"),
            Error::InvalidWindowIndex(i) => write!(f, "invalid window index: {i}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
