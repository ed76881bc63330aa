// push.rs — Broadcast channel between the relay and connected browsers.
// Every subscriber receives every event; there is no per-client addressing.

use tokio::sync::broadcast;

/// Text shown on the page when nothing has been asked yet.
pub const DEFAULT_PLACEHOLDER: &str = "Waiting for an answer...";

/// One update pushed to every connected page.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Replace the displayed content with this markdown.
    Response(String),
    /// Reset the displayed content to this status text.
    Clear(String),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Response(_) => "response",
            PushEvent::Clear(_) => "clear",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            PushEvent::Response(s) | PushEvent::Clear(s) => s,
        }
    }

    /// Serialize as a server-sent-event frame. Multi-line payloads become one
    /// `data:` line each; EventSource rejoins them with newlines client-side.
    pub fn to_sse(&self) -> String {
        let mut frame = format!("event: {}\n", self.name());
        let payload = self.payload();
        if payload.is_empty() {
            frame.push_str("data: \n");
        } else {
            for line in payload.lines() {
                frame.push_str("data: ");
                frame.push_str(line);
                frame.push('\n');
            }
        }
        frame.push('\n');
        frame
    }
}

/// Cloneable handle for publishing to the push channel.
#[derive(Clone)]
pub struct Publisher {
    tx: broadcast::Sender<PushEvent>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish displayed content. A send error just means no page is open.
    pub fn response(&self, text: impl Into<String>) {
        let _ = self.tx.send(PushEvent::Response(text.into()));
    }

    pub fn clear(&self, message: impl Into<String>) {
        let _ = self.tx.send(PushEvent::Clear(message.into()));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frame_single_line() {
        let ev = PushEvent::Response("hello".into());
        assert_eq!(ev.to_sse(), "event: response\ndata: hello\n\n");
    }

    #[test]
    fn sse_frame_multi_line_markdown() {
        let ev = PushEvent::Response("### Answer\n\n42".into());
        assert_eq!(
            ev.to_sse(),
            "event: response\ndata: ### Answer\ndata: \ndata: 42\n\n"
        );
    }

    #[test]
    fn sse_frame_clear_event() {
        let ev = PushEvent::Clear("X".into());
        assert_eq!(ev.to_sse(), "event: clear\ndata: X\n\n");
    }

    #[test]
    fn sse_frame_empty_payload_still_has_data_line() {
        let ev = PushEvent::Response(String::new());
        assert_eq!(ev.to_sse(), "event: response\ndata: \n\n");
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_event() {
        let publisher = Publisher::new(8);
        let mut rx_a = publisher.subscribe();
        let mut rx_b = publisher.subscribe();

        publisher.response("hello");
        publisher.clear("reset");

        assert_eq!(rx_a.recv().await.unwrap(), PushEvent::Response("hello".into()));
        assert_eq!(rx_a.recv().await.unwrap(), PushEvent::Clear("reset".into()));
        assert_eq!(rx_b.recv().await.unwrap(), PushEvent::Response("hello".into()));
        assert_eq!(rx_b.recv().await.unwrap(), PushEvent::Clear("reset".into()));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let publisher = Publisher::new(8);
        publisher.response("nobody listening");
        publisher.clear("still fine");
    }
}
