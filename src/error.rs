// src/error.rs

//! Unified error handling for the monitor.
//!
//! Each pipeline stage has its own error family so the orchestrator can
//! decide between retrying, aborting the stage, or failing the run.
//! [`AppError`] wraps all of them for `?` propagation at the edges.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

// --- Fetch ---

/// Why a listing fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Bot defense answered with a block or challenge page
    Blocked,
    /// Source asked us to slow down (HTTP 429)
    RateLimited,
    /// Connection, TLS, or body transfer failure
    NetworkError,
    /// Request exceeded its deadline
    Timeout,
    /// Any other non-success status
    UnexpectedStatus,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocked => "blocked",
            Self::RateLimited => "rate limited",
            Self::NetworkError => "network error",
            Self::Timeout => "timeout",
            Self::UnexpectedStatus => "unexpected status",
        };
        f.write_str(s)
    }
}

/// Listing fetch failure.
#[derive(Error, Debug, Clone)]
#[error("fetch failed ({kind}): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    /// Server-provided wait hint (`Retry-After`)
    pub retry_after: Option<Duration>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else {
            FetchErrorKind::NetworkError
        };
        Self::new(kind, err.to_string())
    }
}

// --- Parse ---

/// Listing content did not have the shape the adapter expects.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Expected structure is entirely absent (layout changed, wrong page)
    #[error("{source_name}: expected listing structure not found: {reason}")]
    StructureMismatch { source_name: String, reason: String },

    /// CSS selector could not be compiled
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

impl ParseError {
    pub fn structure(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StructureMismatch {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }
}

// --- Notify ---

/// Why a notification could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyErrorKind {
    RateLimited,
    /// Bad credential or destination; retrying cannot help
    InvalidTarget,
    /// The API refused this message body
    Rejected,
    NetworkError,
}

impl fmt::Display for NotifyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::InvalidTarget => "invalid target",
            Self::Rejected => "message rejected",
            Self::NetworkError => "network error",
        };
        f.write_str(s)
    }
}

/// Notification delivery failure.
#[derive(Error, Debug, Clone)]
#[error("notify failed ({kind}): {message}")]
pub struct NotifyError {
    pub kind: NotifyErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl NotifyError {
    pub fn new(kind: NotifyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Whether this failure should stop the run as a configuration problem.
    pub fn is_fatal(&self) -> bool {
        self.kind == NotifyErrorKind::InvalidTarget
    }
}

// --- State ---

/// Persisted state could not be read or written.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another run holds the lock
    #[error("Another run holds the lock at {path} (since {since})")]
    Locked { path: String, since: String },

    /// Remote backend (S3) failure
    #[error("State backend error: {0}")]
    Remote(String),
}

// --- Application ---

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    State(#[from] StateError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Process exit code for this failure.
    ///
    /// `1` config, `2` fetch, `3` parse, `4` notify, `5` state.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_)
            | Self::Validation(_)
            | Self::Toml(_)
            | Self::Url(_)
            | Self::Http(_) => 1,
            Self::Fetch(_) => 2,
            Self::Parse(_) => 3,
            Self::Notify(_) => 4,
            Self::State(_) | Self::Io(_) | Self::Json(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::new(FetchErrorKind::RateLimited, "HTTP 429");
        assert_eq!(err.to_string(), "fetch failed (rate limited): HTTP 429");
    }

    #[test]
    fn test_invalid_target_is_fatal() {
        assert!(NotifyError::new(NotifyErrorKind::InvalidTarget, "chat not found").is_fatal());
        assert!(!NotifyError::new(NotifyErrorKind::RateLimited, "slow down").is_fatal());
    }

    #[test]
    fn test_exit_codes_are_distinct_per_stage() {
        let fetch: AppError = FetchError::new(FetchErrorKind::Blocked, "403").into();
        let parse: AppError = ParseError::structure("seek", "no cards").into();
        let notify: AppError = NotifyError::new(NotifyErrorKind::NetworkError, "reset").into();
        let state: AppError = StateError::Remote("denied".into()).into();

        assert_eq!(fetch.exit_code(), 2);
        assert_eq!(parse.exit_code(), 3);
        assert_eq!(notify.exit_code(), 4);
        assert_eq!(state.exit_code(), 5);
        assert_eq!(AppError::config("missing token").exit_code(), 1);
    }
}
