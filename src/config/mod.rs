//! Session configuration (layered: code > env > defaults).

use std::fmt;
use std::time::Duration;

use crate::error::{RealtimeError, Result};

pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Connection and session settings for [`RealtimeClient`](crate::client::RealtimeClient).
///
/// Fields set in code win; [`RealtimeConfig::from_env`] fills the rest from
/// `OPENAI_API_KEY`, `OPENAI_REALTIME_URL`, `OPENAI_REALTIME_MODEL`,
/// `REALTIME_EVENT_TIMEOUT_SECS` and `REALTIME_DEBUG`.
#[derive(Clone)]
pub struct RealtimeConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// How long `send` waits for a completion event.
    pub event_timeout: Duration,
    /// Log sent and received frame payloads at debug level.
    pub enable_debug: bool,
    /// WebSocket ping interval; `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("event_timeout", &self.event_timeout)
            .field("enable_debug", &self.enable_debug)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            api_key: None,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            enable_debug: false,
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }
}

impl RealtimeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::default().with_api_key(api_key)
    }

    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_REALTIME_URL") {
            config.base_url = url;
        }
        if let Some(model) = var("OPENAI_REALTIME_MODEL") {
            config.model = model;
        }
        if let Some(secs) = var("REALTIME_EVENT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                RealtimeError::Configuration(format!(
                    "REALTIME_EVENT_TIMEOUT_SECS must be a whole number of seconds, got {secs:?}"
                ))
            })?;
            config.event_timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = var("REALTIME_DEBUG") {
            config.enable_debug = parse_flag(&flag);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, enable_debug: bool) -> Self {
        self.enable_debug = enable_debug;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(RealtimeError::Configuration(
                "Realtime base URL cannot be empty".into(),
            ));
        }
        if self.event_timeout.is_zero() {
            return Err(RealtimeError::Configuration(
                "event timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_the_public_endpoint() {
        let config = RealtimeConfig::default();
        assert_eq!(config.base_url, DEFAULT_REALTIME_URL);
        assert_eq!(config.event_timeout, Duration::from_secs(30));
        assert!(!config.enable_debug);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = RealtimeConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_REALTIME_URL", "ws://127.0.0.1:9000/rt"),
            ("OPENAI_REALTIME_MODEL", "gpt-realtime"),
            ("REALTIME_EVENT_TIMEOUT_SECS", "5"),
            ("REALTIME_DEBUG", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "ws://127.0.0.1:9000/rt");
        assert_eq!(config.model, "gpt-realtime");
        assert_eq!(config.event_timeout, Duration::from_secs(5));
        assert!(config.enable_debug);
    }

    #[test]
    fn blank_values_are_ignored() {
        let config =
            RealtimeConfig::from_lookup(lookup_from(&[("OPENAI_REALTIME_MODEL", "  ")])).unwrap();
        assert_eq!(config.model, DEFAULT_REALTIME_MODEL);
    }

    #[test]
    fn invalid_timeout_is_a_configuration_error() {
        let err = RealtimeConfig::from_lookup(lookup_from(&[(
            "REALTIME_EVENT_TIMEOUT_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(err, RealtimeError::Configuration(_)));

        let zero =
            RealtimeConfig::from_lookup(lookup_from(&[("REALTIME_EVENT_TIMEOUT_SECS", "0")]))
                .unwrap_err();
        assert!(matches!(zero, RealtimeError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let rendered = format!("{:?}", RealtimeConfig::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
