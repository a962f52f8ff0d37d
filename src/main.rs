//! Realtime CLI binary entry point.

use std::io::Write;
use std::sync::{Arc, Mutex};

use clap::Parser;
use openai_realtime::cli::{ChatArgs, Cli, Commands, DEFAULT_LOG_FILTER};
use openai_realtime::client::RealtimeClient;
use openai_realtime::config::RealtimeConfig;
use openai_realtime::events::{ClientEvent, FragmentKind, ServerEvent, SERVER_EVENT_TYPES};
use openai_realtime::streaming::TranscriptAssembler;
use openai_realtime::types::ConversationItem;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());

    let result = match cli.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
        Commands::Events => {
            for event_type in SERVER_EVENT_TYPES {
                println!("{event_type}");
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt) = args.prompt.clone() else {
        eprintln!("Usage: realtime chat \"your prompt here\"");
        std::process::exit(1);
    };

    let config = args.apply_to(RealtimeConfig::from_env()?);
    if config.api_key.is_none() {
        return Err("OPENAI_API_KEY is not set".into());
    }

    let client = RealtimeClient::new(config);
    let session = client.create_session(args.session_options()).await?;

    session
        .send(ClientEvent::item_create(ConversationItem::user_text(prompt)))
        .await?;

    // Stream the reply while response.create is pending.
    let assembler = Arc::new(Mutex::new(TranscriptAssembler::new()));
    let printer = Arc::clone(&assembler);
    let result = session
        .send_with_observer(ClientEvent::response_create(), move |event: &ServerEvent| {
            let Ok(mut assembler) = printer.lock() else {
                return;
            };
            if let Some(update) = assembler.push(event) {
                if update.kind == FragmentKind::Delta {
                    print!("{}", update.text);
                    let _ = std::io::stdout().flush();
                }
            }
        })
        .await;

    println!(); // newline after streaming

    let usage = session.usage();
    session.close().await?;
    result?;

    if args.debug {
        eprintln!(
            "tokens: {} in / {} out",
            usage.input_tokens, usage.output_tokens
        );
    }
    Ok(())
}
