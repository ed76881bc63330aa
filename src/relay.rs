// relay.rs — Orchestrates screenshot → streamed completion → page update.
//
// Admission is single-slot: a trigger arriving while a relay is running is
// rejected, so at most one remote call is in flight. Cancellation is a
// per-invocation token checked at each increment boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ai::{AiError, CompletionProvider};
use crate::push::Publisher;

/// Cooperative cancellation handle scoped to one relay invocation.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a relay invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    Cancelled,
    Failed,
    /// Rejected at admission: another relay was already running.
    Busy,
}

pub struct Relay {
    provider: Arc<dyn CompletionProvider>,
    publisher: Publisher,
    prompt: String,
    throttle: Duration,
    busy: AtomicBool,
    active: Mutex<Option<CancelToken>>,
}

impl Relay {
    pub fn new(provider: Arc<dyn CompletionProvider>, publisher: Publisher, prompt: String) -> Self {
        Self {
            provider,
            publisher,
            prompt,
            throttle: Duration::from_millis(10),
            busy: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Fast-path check used by the dispatcher to skip capture work early.
    /// `run` still performs the authoritative admission.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Request cancellation of the currently running invocation, if any.
    /// A token belongs to exactly one invocation, so a cancel landing after
    /// the relay finished cannot poison the next trigger.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().unwrap().as_ref() {
            token.cancel();
            log::info!("cancellation requested for active relay");
        } else {
            log::debug!("cancellation requested but no relay is running");
        }
    }

    /// Run one end-to-end relay: stream the completion for `image_b64` and
    /// publish each accumulated increment to the push channel.
    ///
    /// Remote errors are terminal for the invocation and surfaced as a single
    /// error string on the page; the relay returns to idle either way.
    pub async fn run(&self, image_b64: String) -> RelayOutcome {
        let token = match self.begin() {
            Some(t) => t,
            None => {
                log::warn!("recognition already in progress, trigger rejected");
                return RelayOutcome::Busy;
            }
        };

        let result = self.stream_once(&image_b64, &token).await;
        self.finish();

        match result {
            Ok(true) => {
                log::info!("relay completed");
                RelayOutcome::Completed
            }
            Ok(false) => {
                log::info!("relay cancelled mid-stream");
                RelayOutcome::Cancelled
            }
            Err(e) => {
                log::error!("relay failed: {e}");
                self.publisher.response(format!("Recognition failed: {e}"));
                RelayOutcome::Failed
            }
        }
    }

    /// Single-slot admission. Returns the fresh token on success.
    fn begin(&self) -> Option<CancelToken> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let token = CancelToken::default();
        *self.active.lock().unwrap() = Some(token.clone());
        Some(token)
    }

    fn finish(&self) {
        *self.active.lock().unwrap() = None;
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Consume the stream. Ok(true) = ran to completion, Ok(false) = cancelled.
    async fn stream_once(&self, image_b64: &str, token: &CancelToken) -> Result<bool, AiError> {
        let mut stream = self
            .provider
            .stream_completion(image_b64, &self.prompt)
            .await?;

        let mut reasoning = String::new();
        let mut answer = String::new();

        while let Some(item) = stream.next_delta().await {
            if token.is_cancelled() {
                // Abandon the remote stream; dropping it closes the connection.
                return Ok(false);
            }
            let delta = item?;
            reasoning.push_str(&delta.reasoning);
            answer.push_str(&delta.answer);
            self.publisher.response(compose(&reasoning, &answer));
            tokio::time::sleep(self.throttle).await;
        }
        Ok(!token.is_cancelled())
    }
}

/// Combine the two trace buffers into the markdown shown on the page.
fn compose(reasoning: &str, answer: &str) -> String {
    let mut out = String::new();
    if !reasoning.is_empty() {
        out.push_str("### Reasoning\n\n");
        out.push_str(reasoning);
        out.push_str("\n\n");
    }
    if !answer.is_empty() {
        out.push_str("### Answer\n\n");
        out.push_str(answer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_answer_only() {
        assert_eq!(compose("", "42"), "### Answer\n\n42");
    }

    #[test]
    fn compose_reasoning_only() {
        assert_eq!(compose("hmm", ""), "### Reasoning\n\nhmm\n\n");
    }

    #[test]
    fn compose_both_sections() {
        assert_eq!(
            compose("let me see", "it is 42"),
            "### Reasoning\n\nlet me see\n\n### Answer\n\nit is 42"
        );
    }

    #[test]
    fn compose_empty_is_empty() {
        assert_eq!(compose("", ""), "");
    }

    #[test]
    fn cancel_token_starts_clear() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
