//! Error types for the chat completions client.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure of the HTTP client.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body is not the expected JSON.
    #[error("Failed to decode response: {0}")]
    JsonDeserialization(#[from] serde_json::Error),

    /// The API answered with a non-success status.
    #[error("API request failed with status {status}: {message}")]
    ApiError {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The completion carried no message content.
    #[error("Completion returned no content")]
    EmptyResponse,

    /// No API key was configured.
    #[error("No API key configured; set {0}")]
    MissingApiKey(&'static str),
}

impl From<LlmError> for deck_core::Error {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey(_) => deck_core::Error::MissingCredentials(e.to_string()),
            other => deck_core::Error::Translator(other.to_string()),
        }
    }
}
