//! Service-level error type.
//!
//! Operations reachable from the HTTP API return [`NavigatorError`] so the
//! server can map each failure to a status code. The `Display` text is what
//! clients see in the `{"error": "..."}` body.

use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Debug, Error)]
pub enum NavigatorError {
    /// The request itself is unusable (400).
    #[error("{0}")]
    BadRequest(String),

    /// The addressed document does not exist (404).
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NavigatorError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        NavigatorError::BadRequest(message.into())
    }

    pub fn document_not_found() -> Self {
        NavigatorError::NotFound("Document not found".to_string())
    }
}

pub type NavigatorResult<T> = std::result::Result<T, NavigatorError>;
