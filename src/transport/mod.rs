//! Transport contract used by realtime sessions.
//!
//! A transport moves discrete text frames in order and reports lifecycle
//! signals. The session never touches sockets directly.

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use strum::Display;
use tokio::sync::mpsc;

use crate::error::RealtimeError;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Lifecycle and data signals emitted by a transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// The connection is established.
    Open,
    /// One inbound text frame.
    Message(String),
    /// The transport failed; the cause is rendered as text.
    Error(String),
    /// The connection is gone. No further signals follow.
    Closed,
}

/// Receiver half handed to the session by [`Transport::open`].
pub type SignalReceiver = mpsc::UnboundedReceiver<TransportSignal>;

/// A bidirectional text-frame transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start connecting. The first signal on the returned receiver is
    /// [`TransportSignal::Open`] on success or [`TransportSignal::Error`] on
    /// failure. Called at most once per session.
    async fn open(&self) -> Result<SignalReceiver, RealtimeError>;

    /// Send one text frame.
    async fn send(&self, text: String) -> Result<(), RealtimeError>;

    /// Close the connection. Calling it again is a no-op.
    async fn close(&self) -> Result<(), RealtimeError>;

    fn state(&self) -> ConnectionState;
}
