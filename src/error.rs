use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    Empty,
    Schema(String),
    Syntax(String),
    UnexpectedEnd,
}

/// Why one decode strategy failed. The decoder absorbs these; they only surface in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub position: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, position: usize) -> Self {
        Self { kind, position }
    }

    pub fn from_serde(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        let kind = match err.classify() {
            Category::Eof => DecodeErrorKind::UnexpectedEnd,
            Category::Data => DecodeErrorKind::Schema(err.to_string()),
            Category::Syntax | Category::Io => DecodeErrorKind::Syntax(err.to_string()),
        };
        Self { kind, position: err.column() }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DecodeErrorKind::Empty => write!(f, "Empty input"),
            DecodeErrorKind::UnexpectedEnd => {
                write!(f, "Unexpected end at position {}", self.position)
            }
            DecodeErrorKind::Schema(msg) => {
                write!(f, "Schema mismatch at position {}: {}", self.position, msg)
            }
            DecodeErrorKind::Syntax(msg) => {
                write!(f, "Syntax error at position {}: {}", self.position, msg)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure of the local key/value store holding the temporary identity.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("corrupt store file: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Errors worth another attempt under the retry policy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::Unauthorized | RemoteError::InvalidUrl(_))
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            429 => RemoteError::RateLimited,
            other => RemoteError::Status(other),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(s) => RemoteError::from_status(s.as_u16()),
            None => RemoteError::Network(e.to_string()),
        }
    }
}

/// The byte stream feeding a decoder broke before closing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
