//! Realtime event session client.
//!
//! Opens a long-lived, two-way event connection to a realtime AI service,
//! sends typed client events, correlates each with the server event that
//! completes it, and streams server events to a single reader as they
//! arrive.
//!
//! # Quick Start
//!
//! ```no_run
//! use openai_realtime::prelude::*;
//!
//! # async fn example() -> openai_realtime::error::Result<()> {
//! let client = RealtimeClient::from_env()?;
//! let session = client
//!     .create_session(SessionOptions::builder().modalities(vec![Modality::Text]).build())
//!     .await?;
//!
//! session
//!     .send(ClientEvent::item_create(ConversationItem::user_text("Hello!")))
//!     .await?;
//! let done = session.send(ClientEvent::response_create()).await?;
//! if let Some(response) = done.as_ref().and_then(ServerEvent::response) {
//!     println!("{}", response.output_text());
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod prelude;
pub mod session;
pub mod streaming;
pub mod transport;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
