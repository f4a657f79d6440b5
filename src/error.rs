//! Error taxonomy for the upload client.
//!
//! Every operation ends in exactly one `UpError`. Its `Display` output is the
//! only diagnostic shown to the user, so variants carrying a server message
//! print that message verbatim.

use std::path::PathBuf;

use thiserror::Error;

use crate::exitcode;

/// Failures of the network layer. Cloneable so a response carrying one can be
/// interpreted more than once with the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to open {}: {message}", .path.display())]
    File { path: PathBuf, message: String },
}

impl TransportError {
    /// Whether another attempt could succeed. Local file errors are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::File { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum UpError {
    #[error("{0}")]
    Usage(String),

    #[error("{}: no such file or directory", .path.display())]
    NotFound { path: PathBuf },

    #[error("stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service reported failure and gave a reason.
    #[error("{0}")]
    Service(String),

    /// The service reported failure without any reason.
    #[error("Unknown error")]
    UnknownService,

    #[error("invalid expire value {value:?}: {reason}")]
    InvalidExpire { value: String, reason: String },

    #[error("config: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for upload client operations.
pub type UpResult<T> = Result<T, UpError>;

impl UpError {
    /// Argument errors get the usage text printed next to them.
    pub fn is_usage(&self) -> bool {
        matches!(self, UpError::Usage(_) | UpError::InvalidExpire { .. })
    }

    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            UpError::Usage(_) | UpError::InvalidExpire { .. } => exitcode::USAGE,
            UpError::NotFound { .. } => exitcode::NOINPUT,
            UpError::Stat { .. } | UpError::Walk { .. } => exitcode::IOERR,
            UpError::Transport(TransportError::File { .. }) => exitcode::NOINPUT,
            UpError::Transport(_) => exitcode::UNAVAILABLE,
            UpError::Service(_) | UpError::UnknownService => exitcode::SOFTWARE,
            UpError::Config(_) => exitcode::CONFIG,
            UpError::Client(_) | UpError::Encode(_) => exitcode::SOFTWARE,
        }
    }
}
