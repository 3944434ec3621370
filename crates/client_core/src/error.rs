use shared::{domain::DraftError, protocol::RecordError};
use thiserror::Error;

/// Every failure a controller operation can report. The variants are what a
/// caller can act on: retry (`Transport`), fix input (`Validation`), drop a
/// stale row (`NotFound`), or give up (`Server`, `Decode`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("person service unreachable: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Validation(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<DraftError> for ClientError {
    fn from(value: DraftError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<RecordError> for ClientError {
    fn from(value: RecordError) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}
