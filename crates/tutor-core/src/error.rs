//! Error types
//!
//! `StreamError` is what a failed stream records in its state; `ApiError`
//! covers request building and non-success responses from the backend.

use thiserror::Error;

/// Failure recorded in `overall.error` of a stream
///
/// Cancellation never produces one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The provider call failed or the byte stream broke mid-read
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The backend answered with a non-success status
    #[error("backend responded with {status}: {message}")]
    ResponseStatus {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The backend sent an unscoped `error` event
    #[error("stream error: {message}")]
    Protocol {
        message: String,
        code: Option<String>,
    },
}

impl StreamError {
    /// Human-readable message, without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            StreamError::Transport { message }
            | StreamError::ResponseStatus { message, .. }
            | StreamError::Protocol { message, .. } => message,
        }
    }

    /// Machine-readable code, when the backend supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            StreamError::Transport { .. } => None,
            StreamError::ResponseStatus { code, .. } | StreamError::Protocol { code, .. } => {
                code.as_deref()
            }
        }
    }

    /// Classify a failure raised by the transport
    pub fn from_transport(err: &anyhow::Error) -> Self {
        if let Some(ApiError::Status {
            status,
            message,
            code,
        }) = err.downcast_ref::<ApiError>()
        {
            return StreamError::ResponseStatus {
                status: *status,
                message: message.clone(),
                code: code.clone(),
            };
        }
        StreamError::Transport {
            message: format!("{err:#}"),
        }
    }
}

/// Errors raised while talking to the tutor backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status, with the message parsed from the error body
    #[error("request failed with status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The request was rejected before it was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
