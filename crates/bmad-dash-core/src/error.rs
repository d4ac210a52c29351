//! Error types for the chat exchange, the message view and the dashboard API.

use thiserror::Error;

use crate::state::MessageId;

/// Message synthesized when a failed response carries no usable error body.
pub fn http_status_message(status: u16) -> String {
    format!("HTTP error! status: {}", status)
}

/// Failure of one chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The message was empty after trimming; nothing was sent
    #[error("message is empty")]
    EmptyMessage,

    /// Network failure while sending the request or reading the body
    #[error("{0}")]
    Transport(String),

    /// The backend answered with a non-2xx status
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The caller cancelled the exchange
    #[error("request cancelled")]
    Cancelled,
}

impl ChatError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ChatError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ChatError::Transport(format!("connection failed: {}", err))
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

/// Misuse of the message view
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    #[error("message {0} is finalized")]
    Finalized(MessageId),
}

/// Failure of a dashboard API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}
