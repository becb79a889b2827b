//! Chat error types

use thiserror::Error;

/// Chat call failure with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// HTTP status, when the failure came with one
    pub status: Option<u16>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Network, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Http, message).with_status(status)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Server, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Decode, message)
    }

    /// Classify a reqwest failure the same way for every endpoint
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else if e.is_builder() {
            Self::invalid_request(format!("Invalid request: {e}"))
        } else if e.is_decode() {
            Self::decode(format!("Failed to parse response: {e}"))
        } else {
            Self::network(format!("Request failed: {e}"))
        }
    }

    /// Network and HTTP failures; the stream never delivered a clean end
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ChatErrorKind::Network | ChatErrorKind::Http)
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ChatErrorKind::Network => true,
            ChatErrorKind::Http => matches!(self.status, Some(429 | 500..=599)),
            ChatErrorKind::Server | ChatErrorKind::InvalidRequest | ChatErrorKind::Decode => false,
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Connect failure, timeout, or the stream broke mid-read
    Network,
    /// Non-success HTTP status
    Http,
    /// The backend reported an error inside the stream
    Server,
    /// The request could not be built
    InvalidRequest,
    /// A non-streaming response body did not parse
    Decode,
}

/// A single frame that could not be turned into an event
///
/// Frame errors never abort a stream; the frame is skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed event frame: {reason}")]
    Malformed { reason: String },
    #[error("unknown event type: {0}")]
    UnknownType(String),
}

impl FrameError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        FrameError::Malformed {
            reason: reason.into(),
        }
    }
}
