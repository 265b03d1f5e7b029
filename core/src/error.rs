use serde::Deserialize;
use thiserror::Error;

/// Every failure the client can hit, from local input checks to the wire.
///
/// The workflow controller catches all of these at its boundary and turns
/// them into a single warning for the operator; nothing here is fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriageError {
    /// Required local input is missing. No request was sent.
    #[error("{0}")]
    Validation(String),
    /// The backend refused the credentials.
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },
    /// Any other non-success response.
    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },
    /// The backend could not be reached at all.
    #[error("transport error: {0}")]
    Transport(String),
    /// A success status with a body we could not decode.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, TriageError>;

/// Machine-readable error codes, shared with the CLI's JSON error output.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const REQUEST_FAILED: &str = "request_failed";
    pub const CONNECTION_ERROR: &str = "connection_error";
    pub const DECODE_ERROR: &str = "decode_error";
}

impl TriageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => codes::VALIDATION_FAILED,
            Self::Auth { .. } => codes::UNAUTHORIZED,
            Self::Request { .. } => codes::REQUEST_FAILED,
            Self::Transport(_) => codes::CONNECTION_ERROR,
            Self::Decode(_) => codes::DECODE_ERROR,
        }
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TriageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Error body as the backend sends it: `{"detail": "..."}`. Validation
/// failures carry a list of field errors instead of a string.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

/// Pull a human message out of an error response body, falling back to the
/// raw text when it is not the usual `detail` shape.
pub(crate) fn backend_message(raw: &str) -> String {
    match serde_json::from_str::<ErrorBody>(raw) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if raw.trim().is_empty() => "empty response".to_string(),
        Err(_) => raw.trim().to_string(),
    }
}
