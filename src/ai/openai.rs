use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{AiError, CompletionProvider, Delta, DeltaStream};

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 10_000,
            client: Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(&self, image_b64: &str, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/png;base64,{}", image_b64) }
                        },
                        { "type": "text", "text": prompt }
                    ]
                }
            ],
            "max_tokens": self.max_tokens,
            "stream": true
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn stream_completion(
        &self,
        image_b64: &str,
        prompt: &str,
    ) -> Result<Box<dyn DeltaStream>, AiError> {
        let body = self.build_request_body(image_b64, prompt);

        let response = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AiError::AuthError(error_body));
            }
            if status.as_u16() == 429 {
                return Err(AiError::RateLimited {
                    retry_after_ms: 1000,
                });
            }
            return Err(AiError::ConnectionError(format!(
                "HTTP {}: {}",
                status, error_body
            )));
        }

        Ok(Box::new(ChatDeltaStream::new(response)))
    }

    fn name(&self) -> &str {
        "openai-chat-completions"
    }
}

/// Streaming SSE reader for the chat-completions API.
pub struct ChatDeltaStream {
    buffer: String,
    done: bool,
    response: Option<reqwest::Response>,
}

impl ChatDeltaStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            buffer: String::new(),
            done: false,
            response: Some(response),
        }
    }
}

/// Parse a single SSE `data:` payload from a chat-completions stream.
enum ParseResult {
    Delta(Delta),
    Done,
    Skip,
    Error(AiError),
}

fn parse_sse_data(data: &str) -> ParseResult {
    let trimmed = data.trim();
    if trimmed == "[DONE]" {
        return ParseResult::Done;
    }

    let parsed: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            return ParseResult::Error(AiError::InvalidResponse(format!(
                "Invalid JSON in SSE: {}",
                e
            )));
        }
    };

    let Some(choice) = parsed.pointer("/choices/0") else {
        return ParseResult::Skip;
    };

    let delta = Delta {
        reasoning: choice
            .pointer("/delta/reasoning_content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        answer: choice
            .pointer("/delta/content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    };

    if !delta.is_empty() {
        return ParseResult::Delta(delta);
    }
    if choice
        .get("finish_reason")
        .map(|v| !v.is_null())
        .unwrap_or(false)
    {
        return ParseResult::Done;
    }
    ParseResult::Skip
}

#[async_trait]
impl DeltaStream for ChatDeltaStream {
    async fn next_delta(&mut self) -> Option<Result<Delta, AiError>> {
        if self.done {
            return None;
        }

        loop {
            // Try to extract a complete line from the buffer
            if let Some(newline_pos) = self.buffer.find('\n') {
                let line = self.buffer[..newline_pos].trim_end_matches('\r').to_string();
                self.buffer = self.buffer[newline_pos + 1..].to_string();

                if line.is_empty() {
                    continue;
                }

                if let Some(data) = line.strip_prefix("data: ") {
                    match parse_sse_data(data) {
                        ParseResult::Delta(delta) => return Some(Ok(delta)),
                        ParseResult::Done => {
                            self.done = true;
                            return None;
                        }
                        ParseResult::Skip => continue,
                        ParseResult::Error(e) => return Some(Err(e)),
                    }
                }

                // Skip non-data SSE lines (comments, event:, id:, retry:)
                continue;
            }

            // Need more data from the network
            let response = match self.response.as_mut() {
                Some(r) => r,
                None => {
                    self.done = true;
                    return None;
                }
            };

            match response.chunk().await {
                Ok(Some(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes);
                    self.buffer.push_str(&text);
                }
                Ok(None) => {
                    // Stream ended
                    self.done = true;
                    if !self.buffer.trim().is_empty() {
                        let remaining = self.buffer.trim().to_string();
                        self.buffer.clear();
                        if let Some(data) = remaining.strip_prefix("data: ") {
                            match parse_sse_data(data) {
                                ParseResult::Delta(delta) => return Some(Ok(delta)),
                                ParseResult::Error(e) => return Some(Err(e)),
                                _ => {}
                            }
                        }
                    }
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(AiError::ConnectionError(format!(
                        "Stream read error: {}",
                        e
                    ))));
                }
            }
        }
    }
}
