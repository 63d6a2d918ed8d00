//! Error taxonomy shared by the fetcher, extractors, search, generation and
//! persistence layers.
//!
//! Failures are classified once, where they cross a collaborator boundary
//! (HTTP transport, search API, LLM API, store), into an [`Error`] variant.
//! Downstream code branches on [`Error::kind`] and never re-parses message
//! text. [`ErrorKind::http_status`] gives the status code a request layer
//! should answer with.

use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing URL, non-HTML page, empty input content.
    #[error("{0}")]
    InvalidInput(String),

    /// A 404 response, or an article id the store does not know.
    #[error("{0}")]
    NotFound(String),

    /// The remote site answered with a 5xx status.
    #[error("The website is currently unavailable (server error {status})")]
    ServerUnavailable { status: u16, url: String },

    /// No HTTP response was obtained (connection refused, DNS, reset, ...).
    #[error("No response received from the server: {0}")]
    Transport(String),

    /// Client-side request timeout or an expired deadline.
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    NoContentExtracted(String),

    #[error("Authentication error - please check your API key: {0}")]
    Auth(String),

    #[error("You exceeded your current quota: {message}")]
    QuotaExceeded {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Rate limit exceeded - please try again later: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("AI enhancement failed: {0}")]
    EnhancementFailed(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A record with the same unique URL already exists.
    #[error("An article with URL {0} already exists")]
    Duplicate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Flat classification of an [`Error`], used for branching and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    ServerUnavailable,
    Transport,
    Timeout,
    NoContentExtracted,
    Auth,
    QuotaExceeded,
    RateLimited,
    EnhancementFailed,
    Persistence,
    Duplicate,
    Config,
}

impl ErrorKind {
    /// HTTP-equivalent status for boundary translation.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Auth => 401,
            ErrorKind::QuotaExceeded | ErrorKind::RateLimited => 429,
            ErrorKind::Timeout => 504,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Duplicate => 409,
            _ => 500,
        }
    }

    /// Short, user-facing headline for this kind of failure.
    pub fn headline(self) -> &'static str {
        match self {
            ErrorKind::Auth => "Invalid API key",
            ErrorKind::QuotaExceeded => "API quota exceeded",
            ErrorKind::RateLimited => "Rate limit exceeded",
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::NotFound => "Not found",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::Duplicate => "Already exists",
            _ => "Internal server error",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ServerUnavailable { .. } => ErrorKind::ServerUnavailable,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::NoContentExtracted(_) => ErrorKind::NoContentExtracted,
            Error::Auth(_) => ErrorKind::Auth,
            Error::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::EnhancementFailed(_) => ErrorKind::EnhancementFailed,
            Error::Persistence(_) => ErrorKind::Persistence,
            Error::Duplicate(_) => ErrorKind::Duplicate,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Server-suggested wait before retrying, when the service sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::QuotaExceeded { retry_after, .. } | Error::RateLimited { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }

    /// Message safe to show a caller. Full error text is only exposed when
    /// `expose_details` is set (non-production environments).
    pub fn public_message(&self, expose_details: bool) -> String {
        if expose_details {
            self.to_string()
        } else {
            self.kind().headline().to_string()
        }
    }
}

/// JSON error body handed to a request layer.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error: String,
    pub kind: ErrorKind,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn from_error(err: &Error, expose_details: bool) -> Self {
        Self {
            success: false,
            message: err.kind().headline().to_string(),
            error: err.public_message(expose_details),
            kind: err.kind(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
