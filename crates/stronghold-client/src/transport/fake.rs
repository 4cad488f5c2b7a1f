//! In-memory transport for driving the channel in tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{EventStream, Transport};
use crate::config::TransportKind;
use crate::error::ClientError;

enum Frame {
    Message(String),
    Fault,
    End,
}

#[derive(Default)]
struct FakeState {
    credentials: Vec<String>,
    failing_connects: usize,
    hanging_connects: usize,
    closes: usize,
    live: Option<mpsc::UnboundedSender<Frame>>,
}

/// Transport whose connections are fed by a [`FakeServer`].
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

/// Test-side control over the fake connections.
#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub(crate) fn new() -> (Self, FakeServer) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        (
            Self {
                state: state.clone(),
            },
            FakeServer { state },
        )
    }
}

impl FakeServer {
    /// Number of connect attempts, successful or not.
    pub(crate) fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().credentials.len()
    }

    /// Credential offered on the latest connect.
    pub(crate) fn last_credential(&self) -> Option<String> {
        self.state.lock().unwrap().credentials.last().cloned()
    }

    /// Number of caller-initiated closes.
    pub(crate) fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Make the next `n` connect attempts fail.
    pub(crate) fn fail_connects(&self, n: usize) {
        self.state.lock().unwrap().failing_connects = n;
    }

    /// Make the next `n` connect attempts never resolve.
    pub(crate) fn hang_connects(&self, n: usize) {
        self.state.lock().unwrap().hanging_connects = n;
    }

    /// Push a raw message into the live connection.
    pub(crate) fn push(&self, raw: &str) {
        self.send(Frame::Message(raw.to_string()));
    }

    /// Inject a transport error into the live connection.
    pub(crate) fn fault(&self) {
        self.send(Frame::Fault);
    }

    /// End the live connection as if the server closed it.
    pub(crate) fn hang_up(&self) {
        self.send(Frame::End);
    }

    fn send(&self, frame: Frame) {
        if let Some(tx) = &self.state.lock().unwrap().live {
            let _ = tx.send(frame);
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn connect(&self, credential: &str) -> Result<Box<dyn EventStream>, ClientError> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.credentials.push(credential.to_string());

            if state.failing_connects > 0 {
                state.failing_connects -= 1;
                return Err(ClientError::Connection("connection refused".into()));
            }
            if state.hanging_connects > 0 {
                state.hanging_connects -= 1;
                true
            } else {
                false
            }
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().live = Some(tx);
        Ok(Box::new(FakeEvents {
            rx,
            state: self.state.clone(),
        }))
    }
}

struct FakeEvents {
    rx: mpsc::UnboundedReceiver<Frame>,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl EventStream for FakeEvents {
    async fn next_message(&mut self) -> Option<Result<String, ClientError>> {
        match self.rx.recv().await {
            Some(Frame::Message(raw)) => Some(Ok(raw)),
            Some(Frame::Fault) => Some(Err(ClientError::Connection("connection reset".into()))),
            Some(Frame::End) | None => None,
        }
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}
