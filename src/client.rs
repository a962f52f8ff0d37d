//! Entry point that builds the transport and opens configured sessions.

use std::sync::Arc;

use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::events::ClientEvent;
use crate::session::RealtimeSession;
use crate::transport::Transport;
use crate::types::SessionOptions;

/// Opens [`RealtimeSession`]s with a shared [`RealtimeConfig`].
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    config: RealtimeConfig,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    /// Build a client from environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(RealtimeConfig::from_env()?))
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Connect over WebSocket and apply `options` with `session.update`.
    ///
    /// The returned session already reflects the server's answer in
    /// [`RealtimeSession::options`].
    #[cfg(feature = "websocket")]
    pub async fn create_session(&self, options: SessionOptions) -> Result<RealtimeSession> {
        self.config.validate()?;
        let transport = crate::transport::WebSocketTransport::from_config(&self.config)?;
        self.create_session_with(Arc::new(transport), options).await
    }

    /// Same as [`create_session`](Self::create_session) over a caller-supplied transport.
    pub async fn create_session_with(
        &self,
        transport: Arc<dyn Transport>,
        options: SessionOptions,
    ) -> Result<RealtimeSession> {
        options.validate()?;
        let session = RealtimeSession::connect(transport).await?;
        session.set_event_timeout(self.config.event_timeout);
        session.set_debug(self.config.enable_debug);

        if let Err(error) = session.send(ClientEvent::session_update(options)).await {
            tracing::warn!(error = %error, "initial session update failed");
            let _ = session.close().await;
            return Err(error);
        }
        tracing::debug!(model = ?session.options().model, "realtime session configured");
        Ok(session)
    }
}
