use async_trait::async_trait;

pub mod openai;
pub mod types;
pub use types::*;

/// Trait for multimodal completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submit a screenshot plus an instruction and open a streamed completion.
    /// `image_b64` is base64-encoded PNG.
    async fn stream_completion(
        &self,
        image_b64: &str,
        prompt: &str,
    ) -> Result<Box<dyn DeltaStream>, AiError>;

    /// Provider name for logging/display.
    fn name(&self) -> &str;
}
