pub mod google;
pub mod sanitize;
pub mod status;

use crate::types::{GenerationOptions, ModelInfo, StudyRequest};
use async_trait::async_trait;

pub use google::GeminiClient;
pub use status::StatusKind;

/// Errors from generative API calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// `body` is sanitized and truncated; `api_status` and `retry_after_ms`
    /// are read from the full body before that happens.
    #[error("HTTP error {status}: {body}")]
    Http {
        status: u16,
        body: String,
        api_status: Option<String>,
        retry_after_ms: Option<u64>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Model returned no text (finish reason: {finish_reason})")]
    EmptyReply { finish_reason: String },

    #[error("{0}")]
    Other(String),
}

/// A hosted generative-language service.
///
/// The Gemini HTTP client implements this; tests drive the engine with
/// in-memory backends.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Generate a text reply for one request under the given system instruction.
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        system_instruction: &str,
        request: &StudyRequest,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;

    /// Minimal trial generation, used to test whether `model` is callable.
    async fn probe(&self, api_key: &str, model: &str) -> Result<(), ProviderError>;

    /// Models currently callable with these credentials.
    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelInfo>, ProviderError>;
}
