//! Server-sent events transport.
//!
//! Streams `GET /events?type=chieftain` and turns each SSE event's `data:`
//! lines into one message.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::{EventStream, Transport};
use crate::config::TransportKind;
use crate::error::ClientError;
use crate::gateway::CREDENTIAL_HEADER;

/// Path of the chieftain event stream.
pub const EVENTS_PATH: &str = "/events";

/// Server-sent events transport.
#[derive(Debug, Clone)]
pub struct SseTransport {
    http: reqwest::Client,
    url: String,
}

impl SseTransport {
    /// Create a transport for the server at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), EVENTS_PATH),
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ServerSentEvents
    }

    async fn connect(&self, credential: &str) -> Result<Box<dyn EventStream>, ClientError> {
        debug!(url = %self.url, "Opening event stream");

        let response = self
            .http
            .get(&self.url)
            .query(&[("type", "chieftain"), ("token", credential)])
            .header(CREDENTIAL_HEADER, credential)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Connection(format!(
                "event stream returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        debug!(url = %self.url, "Event stream open");
        Ok(Box::new(SseEvents {
            body,
            buffer: Vec::new(),
        }))
    }
}

struct SseEvents {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
}

#[async_trait]
impl EventStream for SseEvents {
    async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            while let Some(event) = extract_sse_event(&mut self.buffer) {
                if let Some(data) = event {
                    return Some(Ok(data));
                }
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend(chunk.into_iter().filter(|b| *b != b'\r'));
                }
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        // Dropping the body releases the connection
        self.body = futures_util::stream::empty().boxed();
        self.buffer.clear();
    }
}

/// Extract one complete SSE event from the buffer.
/// Returns Some(Some(data)) if an event with data was found,
/// Some(None) if a comment or data-less event was consumed,
/// None if no complete event is available yet.
fn extract_sse_event(buffer: &mut Vec<u8>) -> Option<Option<String>> {
    let end_idx = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event_bytes: Vec<u8> = buffer.drain(..end_idx + 2).collect();
    let event_text = String::from_utf8_lossy(&event_bytes[..end_idx]);

    let mut data_lines = Vec::new();
    for line in event_text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return Some(None);
    }
    Some(Some(data_lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Seen {
        params: Arc<Mutex<HashMap<String, String>>>,
        header: Arc<Mutex<Option<String>>>,
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn chieftain_events(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        *seen.params.lock().unwrap() = params;
        *seen.header.lock().unwrap() = headers
            .get(CREDENTIAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            ": connected\n\ndata: {\"n\":1}\n\nevent: update\ndata: {\"n\":2}\n\n",
        )
    }

    #[test]
    fn test_extract_single_event() {
        let mut buffer = b"event: update\ndata: {\"a\":1}\n\nrest".to_vec();
        assert_eq!(
            extract_sse_event(&mut buffer),
            Some(Some("{\"a\":1}".to_string()))
        );
        assert_eq!(buffer, b"rest".to_vec());
        assert_eq!(extract_sse_event(&mut buffer), None);
    }

    #[test]
    fn test_extract_joins_multiline_data() {
        let mut buffer = b"data: {\"a\":\ndata:1}\n\n".to_vec();
        assert_eq!(
            extract_sse_event(&mut buffer),
            Some(Some("{\"a\":\n1}".to_string()))
        );
    }

    #[test]
    fn test_extract_skips_comments() {
        let mut buffer = b": keep-alive\n\ndata: x\n\n".to_vec();
        assert_eq!(extract_sse_event(&mut buffer), Some(None));
        assert_eq!(extract_sse_event(&mut buffer), Some(Some("x".to_string())));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_stream_reassembles_split_chunks() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![
            Ok(b"data: {\"ki".to_vec()),
            Ok(b"nd\":1}\r\n\r\ndata: second\n".to_vec()),
            Ok(b"\n".to_vec()),
        ];
        let mut events = SseEvents {
            body: futures_util::stream::iter(chunks).boxed(),
            buffer: Vec::new(),
        };

        assert_eq!(
            events.next_message().await.unwrap().unwrap(),
            "{\"kind\":1}"
        );
        assert_eq!(events.next_message().await.unwrap().unwrap(), "second");
        assert!(events.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_passes_credential_and_streams_events() {
        let seen = Seen::default();
        let app = Router::new()
            .route(EVENTS_PATH, get(chieftain_events))
            .with_state(seen.clone());
        let transport = SseTransport::new(&serve(app).await);

        let mut stream = transport.connect("c0ffee").await.unwrap();

        {
            let params = seen.params.lock().unwrap();
            assert_eq!(params.get("type").map(String::as_str), Some("chieftain"));
            assert_eq!(params.get("token").map(String::as_str), Some("c0ffee"));
        }
        assert_eq!(seen.header.lock().unwrap().as_deref(), Some("c0ffee"));

        assert_eq!(stream.next_message().await.unwrap().unwrap(), "{\"n\":1}");
        assert_eq!(stream.next_message().await.unwrap().unwrap(), "{\"n\":2}");
        assert!(stream.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_rejected_stream_is_connect_error() {
        let app = Router::new().route(EVENTS_PATH, get(|| async { StatusCode::UNAUTHORIZED }));
        let transport = SseTransport::new(&serve(app).await);

        let err = match transport.connect("wrong").await {
            Ok(_) => panic!("expected the connect to fail"),
            Err(e) => e,
        };
        assert!(matches!(err, ClientError::Connection(ref msg) if msg.contains("401")));
    }
}
