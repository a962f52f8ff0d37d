//! Command-line driver for realtime sessions.

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::RealtimeConfig;
use crate::types::{Modality, SessionOptions};

/// Realtime session CLI
#[derive(Parser, Debug)]
#[command(name = "realtime", version, about = "Talk to a realtime model from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and stream the reply
    Chat(ChatArgs),
    /// List every server event type the client understands
    Events,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model name (defaults to OPENAI_REALTIME_MODEL or the built-in default)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Session instructions
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Output voice (alloy, ash, ballad, coral, echo, sage, shimmer, verse)
    #[arg(long)]
    pub voice: Option<String>,

    /// Also request audio; the audio transcript is printed
    #[arg(long)]
    pub audio: bool,

    /// Sampling temperature (0.6 - 1.2)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Seconds to wait for each completion event
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log lifecycle events and frame payloads to stderr
    #[arg(long)]
    pub debug: bool,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log filter for the stderr subscriber. `None` defers to `RUST_LOG`.
    pub fn log_filter(&self) -> Option<&'static str> {
        match &self.command {
            Commands::Chat(args) if args.debug => Some(DEBUG_LOG_FILTER),
            _ => None,
        }
    }
}

/// Filter used by `chat --debug`.
pub const DEBUG_LOG_FILTER: &str = "openai_realtime=debug,warn";

/// Filter used when neither `--debug` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "warn";

impl ChatArgs {
    /// Apply command-line overrides on top of `config`.
    pub fn apply_to(&self, mut config: RealtimeConfig) -> RealtimeConfig {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(secs) = self.timeout {
            config.event_timeout = Duration::from_secs(secs);
        }
        if self.debug {
            config.enable_debug = true;
        }
        config
    }

    /// Session options requested by these arguments.
    pub fn session_options(&self) -> SessionOptions {
        let modalities = if self.audio {
            vec![Modality::Text, Modality::Audio]
        } else {
            vec![Modality::Text]
        };
        let mut options = SessionOptions::builder().modalities(modalities).build();
        options.instructions = self.instructions.clone();
        options.voice = self.voice.clone();
        options.temperature = self.temperature;
        options
    }
}
