//! Convenience re-exports for common use.

pub use crate::client::RealtimeClient;
pub use crate::config::RealtimeConfig;
pub use crate::error::{RealtimeError, Result};
pub use crate::events::{
    ClientEvent, ClientEventKind, RealtimeEvent, RealtimeUpdate, ResponseEvent, ServerEvent,
    TextDeltaEvent,
};
pub use crate::session::RealtimeSession;
pub use crate::streaming::{TranscriptAssembler, TranscriptUpdate};
pub use crate::transport::{ConnectionState, Transport, TransportSignal};
pub use crate::types::{
    ConversationItem, Modality, ResponseStatus, SessionOptions, Usage,
    VoiceActivityDetectionSettings,
};
pub use tokio_util::sync::CancellationToken;
