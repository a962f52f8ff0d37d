//! Domain types shared by realtime events.

pub mod audio;
pub mod conversation;
pub mod error;
pub mod response;
pub mod session;
pub mod tool;
pub mod turn_detection;
pub mod usage;

pub use audio::*;
pub use conversation::*;
pub use error::*;
pub use response::*;
pub use session::*;
pub use tool::*;
pub use turn_detection::{Eagerness, TurnDetectionType, VoiceActivityDetectionSettings};
pub use usage::*;
