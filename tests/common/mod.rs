//! Shared test helpers and an in-memory transport.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};

use openai_realtime::error::RealtimeError;
use openai_realtime::session::RealtimeSession;
use openai_realtime::transport::{ConnectionState, SignalReceiver, Transport, TransportSignal};

type Responder = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// A transport that records sent frames and lets tests inject signals.
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
    sent_notify: Notify,
    tx_signal: Mutex<Option<mpsc::UnboundedSender<TransportSignal>>>,
    state: Mutex<ConnectionState>,
    first_signal: TransportSignal,
    responder: Option<Responder>,
    close_calls: AtomicUsize,
}

impl MockTransport {
    fn build(first_signal: TransportSignal, responder: Option<Responder>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            tx_signal: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            first_signal,
            responder,
            close_calls: AtomicUsize::new(0),
        })
    }

    /// Opens successfully; the test plays the server by hand.
    pub fn new() -> Arc<Self> {
        Self::build(TransportSignal::Open, None)
    }

    /// Opens successfully and answers every frame with [`ack`].
    pub fn acking() -> Arc<Self> {
        Self::build(TransportSignal::Open, Some(Box::new(ack)))
    }

    /// Opens successfully and answers every frame with `responder`.
    pub fn with_responder<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        Self::build(TransportSignal::Open, Some(Box::new(responder)))
    }

    /// Reports `cause` instead of opening.
    pub fn failing(cause: &str) -> Arc<Self> {
        Self::build(TransportSignal::Error(cause.to_string()), None)
    }

    /// Inject one server frame.
    pub fn push(&self, frame: Value) {
        self.signal(TransportSignal::Message(frame.to_string()));
    }

    pub fn push_raw(&self, text: &str) {
        self.signal(TransportSignal::Message(text.to_string()));
    }

    /// Simulate the remote end going away.
    pub fn remote_close(&self) {
        *self.state.lock().unwrap() = ConnectionState::Closed;
        self.signal(TransportSignal::Closed);
    }

    fn signal(&self, signal: TransportSignal) {
        if let Some(tx) = self.tx_signal.lock().unwrap().as_ref() {
            let _ = tx.send(signal);
        }
    }

    /// Every frame sent so far, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame should be JSON"))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Wait until at least `count` frames were sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent_count() >= count {
                return self.sent();
            }
            notified.await;
        }
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<SignalReceiver, RealtimeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.first_signal.clone());
        if self.first_signal == TransportSignal::Open {
            *self.state.lock().unwrap() = ConnectionState::Open;
        }
        *self.tx_signal.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send(&self, text: String) -> Result<(), RealtimeError> {
        let frame: Value = serde_json::from_str(&text)?;
        self.sent.lock().unwrap().push(text);
        self.sent_notify.notify_waiters();
        if let Some(responder) = &self.responder {
            for reply in responder(&frame) {
                self.push(reply);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), RealtimeError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = ConnectionState::Closed;
        self.signal(TransportSignal::Closed);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }
}

/// The completion a well-behaved server sends for `frame`.
pub fn ack(frame: &Value) -> Vec<Value> {
    let item_id = frame["item_id"].as_str().unwrap_or("item_1");
    match frame["type"].as_str().unwrap_or_default() {
        "session.update" => vec![json!({
            "type": "session.updated",
            "event_id": "event_session",
            "session": frame["session"].clone()
        })],
        "input_audio_buffer.commit" => vec![json!({
            "type": "input_audio_buffer.committed",
            "item_id": "item_committed"
        })],
        "input_audio_buffer.clear" => vec![json!({"type": "input_audio_buffer.cleared"})],
        "conversation.item.create" => vec![json!({
            "type": "conversation.item.created",
            "item": frame["item"].clone()
        })],
        "conversation.item.truncate" => vec![json!({
            "type": "conversation.item.truncated",
            "item_id": item_id,
            "content_index": frame["content_index"].clone(),
            "audio_end_ms": frame["audio_end_ms"].clone()
        })],
        "conversation.item.delete" => vec![json!({
            "type": "conversation.item.deleted",
            "item_id": item_id
        })],
        "response.create" => vec![
            response_event("response.created", "resp_1", "in_progress"),
            response_event("response.done", "resp_1", "completed"),
        ],
        "response.cancel" => vec![response_event("response.done", "resp_1", "cancelled")],
        _ => vec![],
    }
}

pub fn response_event(event_type: &str, id: &str, status: &str) -> Value {
    json!({
        "type": event_type,
        "response": {"id": id, "object": "realtime.response", "status": status, "output": []}
    })
}

/// Connect a session over `transport`.
pub async fn connect(transport: &Arc<MockTransport>) -> RealtimeSession {
    RealtimeSession::connect(transport.clone())
        .await
        .expect("mock transport should connect")
}
