/// Error type for completion-API operations.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Rate limited — retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Model error: {0}")]
    ModelError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One streamed increment from the model. Providers that expose a reasoning
/// trace deliver it separately from the answer text; either side may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub reasoning: String,
    pub answer: String,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_empty() && self.answer.is_empty()
    }
}

/// Trait for streaming completion increments (chunk by chunk).
#[async_trait::async_trait]
pub trait DeltaStream: Send {
    /// Get the next increment. Returns None when the stream is complete.
    async fn next_delta(&mut self) -> Option<Result<Delta, AiError>>;
}
