//! Realtime event model.
//!
//! Events are split by direction: [`ClientEvent`] is what a caller may send,
//! [`ServerEvent`] is what the server may send. Both are discriminated on the
//! wire by their `type` tag and carry an optional `event_id`.

pub mod client;
pub mod server;

pub use client::{ClientEvent, ClientEventKind};
pub use server::*;

/// Either direction, as kept in a session's event queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Client(ClientEvent),
    Server(ServerEvent),
}

impl RealtimeEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Client(event) => event.event_type(),
            Self::Server(event) => event.event_type(),
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Client(event) => event.event_id(),
            Self::Server(event) => event.event_id(),
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}

impl From<ClientEvent> for RealtimeEvent {
    fn from(event: ClientEvent) -> Self {
        Self::Client(event)
    }
}

impl From<ServerEvent> for RealtimeEvent {
    fn from(event: ServerEvent) -> Self {
        Self::Server(event)
    }
}

/// Partial or terminal fragment of a streamed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Delta,
    Done,
}

impl FragmentKind {
    /// Classify a type tag by its `delta` / `done` suffix.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        if event_type.ends_with("delta") {
            Some(Self::Delta)
        } else if event_type.ends_with("done") {
            Some(Self::Done)
        } else {
            None
        }
    }
}

/// A type that can be pulled out of the event queue by a streaming reader.
///
/// Implemented for [`RealtimeEvent`] (everything), [`ServerEvent`],
/// [`ClientEvent`] and every server payload struct.
pub trait RealtimeUpdate: Sized + Send + 'static {
    /// Take the update out of `event`, or hand the event back untouched.
    fn extract(event: RealtimeEvent) -> Result<Self, RealtimeEvent>;
}

impl RealtimeUpdate for RealtimeEvent {
    fn extract(event: RealtimeEvent) -> Result<Self, RealtimeEvent> {
        Ok(event)
    }
}

impl RealtimeUpdate for ServerEvent {
    fn extract(event: RealtimeEvent) -> Result<Self, RealtimeEvent> {
        match event {
            RealtimeEvent::Server(event) => Ok(event),
            other => Err(other),
        }
    }
}

impl RealtimeUpdate for ClientEvent {
    fn extract(event: RealtimeEvent) -> Result<Self, RealtimeEvent> {
        match event {
            RealtimeEvent::Client(event) => Ok(event),
            other => Err(other),
        }
    }
}
