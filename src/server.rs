// server.rs — Local web front end: one HTML page, two plain HTTP endpoints,
// and an SSE stream fed from the push channel.

use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::push::{PushEvent, Publisher, DEFAULT_PLACEHOLDER};

type PageBody = UnsyncBoxBody<Bytes, Infallible>;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head>
    <title>shotrelay</title>
    <meta charset="utf-8">
    <style>
      body { font-family: sans-serif; margin: 2em; background: #f8f9fa; font-size: 35px; }
      #output { white-space: pre-wrap; padding-bottom: 200px; }
    </style>
    <script src="https://cdn.jsdelivr.net/npm/marked/marked.min.js"></script>
  </head>
  <body>
    <h2>shotrelay</h2>
    <div id="output">Waiting for an answer...</div>
    <script>
      const events = new EventSource("/events");
      let latestContent = "";
      let shouldUpdate = false;
      events.addEventListener("response", (e) => { latestContent = e.data; shouldUpdate = true; });
      events.addEventListener("clear", (e) => { latestContent = e.data || "Waiting for an answer..."; shouldUpdate = true; });
      setInterval(() => {
        if (shouldUpdate) {
          document.getElementById("output").innerHTML = marked.parse(latestContent);
          window.scrollTo(0, document.body.scrollHeight);
          shouldUpdate = false;
        }
      }, 150);
    </script>
  </body>
</html>
"#;

/// Accept loop. Each connection gets its own task and service instance.
pub async fn serve(port: u16, publisher: Publisher) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("web front end listening on 0.0.0.0:{port}");

    loop {
        let (stream, peer) = listener.accept().await?;
        let publisher = publisher.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(req, publisher.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                log::debug!("connection from {peer} ended: {err}");
            }
        });
    }
}

/// Route one request. Generic over the body type so tests can drive it with
/// `Full<Bytes>` instead of `hyper::body::Incoming`.
async fn handle<B>(req: Request<B>, publisher: Publisher) -> Result<Response<PageBody>, B::Error>
where
    B: Body,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => Ok(html_response(INDEX_HTML)),
        (&Method::POST, "/submit") => {
            let body = req.into_body().collect().await?.to_bytes();
            let text = json_string_field(&body, "text").unwrap_or_default();
            publisher.response(text);
            Ok(text_response("ok"))
        }
        (&Method::POST, "/clear") => {
            let body = req.into_body().collect().await?.to_bytes();
            let message = json_string_field(&body, "message")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());
            publisher.clear(message);
            Ok(text_response("cleared"))
        }
        (&Method::GET, "/events") => Ok(sse_response(publisher.subscribe())),
        _ => {
            let mut resp = text_response("not found");
            *resp.status_mut() = StatusCode::NOT_FOUND;
            Ok(resp)
        }
    }
}

/// Extract a string field from a JSON request body, tolerating absent or
/// malformed bodies.
fn json_string_field(body: &[u8], field: &str) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get(field)?
        .as_str()
        .map(str::to_string)
}

fn full(content: impl Into<Bytes>) -> PageBody {
    Full::new(content.into()).boxed_unsync()
}

fn text_response(content: &'static str) -> Response<PageBody> {
    let mut resp = Response::new(full(content));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

fn html_response(content: &'static str) -> Response<PageBody> {
    let mut resp = Response::new(full(content));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    resp
}

/// Long-lived SSE body backed by a broadcast subscription. Lagged receivers
/// skip missed events; the body ends when every publisher handle is dropped.
fn sse_response(rx: broadcast::Receiver<PushEvent>) -> Response<PageBody> {
    let event_stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let chunk = Bytes::from(event.to_sse());
                    return Some((Ok::<_, Infallible>(Frame::data(chunk)), rx));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("sse subscriber lagged, skipped {skipped} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let mut resp = Response::new(StreamBody::new(event_stream).boxed_unsync());
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_text(resp: Response<PageBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn index_serves_html_page() {
        let publisher = Publisher::new(8);
        let resp = handle(request(Method::GET, "/", ""), publisher)
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = body_text(resp).await;
        assert!(body.contains("EventSource(\"/events\")"));
    }

    #[tokio::test]
    async fn submit_broadcasts_text_to_every_subscriber() {
        let publisher = Publisher::new(8);
        let mut rx_a = publisher.subscribe();
        let mut rx_b = publisher.subscribe();

        let resp = handle(
            request(Method::POST, "/submit", r#"{"text": "hello"}"#),
            publisher,
        )
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
        assert_eq!(rx_a.try_recv().unwrap(), PushEvent::Response("hello".into()));
        assert_eq!(rx_b.try_recv().unwrap(), PushEvent::Response("hello".into()));
    }

    #[tokio::test]
    async fn submit_without_text_broadcasts_empty_string() {
        let publisher = Publisher::new(8);
        let mut rx = publisher.subscribe();

        handle(request(Method::POST, "/submit", "{}"), publisher)
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), PushEvent::Response(String::new()));
    }

    #[tokio::test]
    async fn clear_without_body_uses_placeholder() {
        let publisher = Publisher::new(8);
        let mut rx = publisher.subscribe();

        let resp = handle(request(Method::POST, "/clear", ""), publisher)
            .await
            .unwrap();

        assert_eq!(body_text(resp).await, "cleared");
        assert_eq!(
            rx.try_recv().unwrap(),
            PushEvent::Clear(DEFAULT_PLACEHOLDER.into())
        );
    }

    #[tokio::test]
    async fn clear_with_message_broadcasts_it() {
        let publisher = Publisher::new(8);
        let mut rx = publisher.subscribe();

        handle(
            request(Method::POST, "/clear", r#"{"message": "X"}"#),
            publisher,
        )
        .await
        .unwrap();

        assert_eq!(rx.try_recv().unwrap(), PushEvent::Clear("X".into()));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let publisher = Publisher::new(8);
        let resp = handle(request(Method::GET, "/nope", ""), publisher)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sse_stream_relays_broadcast_events_until_closed() {
        let (tx, rx) = broadcast::channel(8);
        let resp = sse_response(rx);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        tx.send(PushEvent::Response("hi".into())).unwrap();
        tx.send(PushEvent::Clear("bye".into())).unwrap();
        drop(tx);

        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().ok().unwrap();
        assert_eq!(first, Bytes::from("event: response\ndata: hi\n\n"));
        let second = body.frame().await.unwrap().unwrap().into_data().ok().unwrap();
        assert_eq!(second, Bytes::from("event: clear\ndata: bye\n\n"));
        assert!(body.frame().await.is_none());
    }

    #[test]
    fn json_field_extraction_tolerates_garbage() {
        assert_eq!(json_string_field(b"not json", "text"), None);
        assert_eq!(json_string_field(b"{}", "text"), None);
        assert_eq!(json_string_field(br#"{"text": 5}"#, "text"), None);
        assert_eq!(
            json_string_field(br#"{"text": "ok"}"#, "text"),
            Some("ok".into())
        );
    }
}
