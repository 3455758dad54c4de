//! Tabby CLI
//!
//! Terminal chat client for the Tabby backend. Responses stream with live
//! progress and Ctrl-C stops the one in flight.

mod commands;
mod logging;
mod ui;

use anyhow::{bail, Context, Result};
use clap::Parser;
use commands::{Command, HELP_TEXT};
use logging::LogConfig;
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tabby_core::chat::{ChatClient, ClientMessages, ClientOptions};
use tabby_core::infrastructure::{ChatTransport, HttpChatTransport};
use tabby_core::markdown::MarkdownRenderer;
use tabby_core::ClientConfig;
use tabby_core_types::ChatRequest;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use ui::{TerminalMarkdownRenderer, TerminalView};

#[derive(Parser, Debug)]
#[command(name = "tabby-cli", version, about = "Terminal client for the Tabby chat backend")]
struct Args {
    /// Backend origin, overrides the config file and TABBY_BASE_URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Config file (default: <config dir>/tabby/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// trace, debug, info, warn, error or off
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Debug mode: default log level becomes debug
    #[arg(long)]
    debug: bool,

    /// Log file (default: .logs/tabby-cli-<timestamp>.log)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Write logs to stderr instead of a file
    #[arg(long)]
    log_stderr: bool,

    /// Send one message through the non-streaming endpoint and exit
    #[arg(long, value_name = "MESSAGE")]
    no_stream: Option<String>,
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn terminal_renderer() -> TerminalMarkdownRenderer {
    if std::io::stdout().is_terminal() {
        TerminalMarkdownRenderer::new()
    } else {
        TerminalMarkdownRenderer::without_styles()
    }
}

fn cli_messages() -> ClientMessages {
    ClientMessages {
        session_failed: "Could not start chat session. Use /reset to try again.".to_string(),
        connect_failed:
            "⚠️ Could not connect to the server. Use /reset to start a new session.".to_string(),
        ..ClientMessages::default()
    }
}

async fn run_one_shot(transport: &dyn ChatTransport, message: &str) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        bail!("--no-stream needs a non-empty message");
    }
    let thread_id = transport
        .create_session()
        .await
        .context("Could not start chat session")?;
    let reply = transport
        .send_message(&ChatRequest::new(message, thread_id))
        .await
        .context("Chat request failed")?;
    println!("{}", terminal_renderer().render(&reply));
    Ok(())
}

/// Awaits `operation` unless Ctrl-C arrives first, in which case the
/// operation is dropped and `None` returned.
async fn until_interrupted<F: Future>(operation: F) -> Option<F::Output> {
    tokio::pin!(operation);
    tokio::select! {
        output = &mut operation => Some(output),
        result = signal::ctrl_c() => match result {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                Some(operation.await)
            }
        },
    }
}

/// Drives one submission; Ctrl-C cancels it instead of exiting.
async fn submit_with_cancel(client: &ChatClient, message: &str) {
    let submit = client.submit(message);
    tokio::pin!(submit);
    loop {
        tokio::select! {
            _ = &mut submit => return,
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    submit.await;
                    return;
                }
                client.cancel();
            }
        }
    }
}

async fn run_interactive(transport: Arc<dyn ChatTransport>, config: &ClientConfig) -> Result<()> {
    let view = Arc::new(TerminalView::stdout());
    let options = ClientOptions {
        messages: cli_messages(),
        ..ClientOptions::from(config)
    };
    let client = ChatClient::new(
        transport,
        view.clone(),
        Arc::new(terminal_renderer()),
        options,
    );

    view.notice(&format!(
        "Tabby chat ({}). Type /help for commands.",
        config.base_url
    ));
    match until_interrupted(client.init()).await {
        Some(Ok(())) => {}
        Some(Err(e)) => warn!("Starting without a session: {}", e),
        None => {
            info!("Interrupted while starting a session");
            client.dispose();
            return Ok(());
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut prompt_pending = true;
    loop {
        if prompt_pending {
            view.show_prompt();
        }
        prompt_pending = true;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = signal::ctrl_c() => {
                view.notice("");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => view.notice(HELP_TEXT),
            Command::Unknown(command) => view.notice(&format!(
                "Unknown command {}. Type /help for commands.",
                command
            )),
            Command::Reset => match until_interrupted(client.reset()).await {
                Some(Ok(())) => view.notice("Started a new conversation."),
                Some(Err(e)) => warn!("Reset failed: {}", e),
                None => {
                    info!("Session reset interrupted");
                    view.notice("");
                    view.notice("Reset interrupted. Use /reset to try again.");
                }
            },
            Command::Message(text) => {
                if client.session_id().is_none() {
                    view.notice("No chat session. Use /reset to try again.");
                    continue;
                }
                submit_with_cancel(&client, &text).await;
                // The view re-focuses input, which prints the prompt.
                prompt_pending = false;
            }
        }
    }

    info!("Exiting interactive session");
    client.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = LogConfig::new(
        args.log_level.as_deref(),
        args.debug,
        args.log_file.clone(),
        args.log_stderr,
    );
    logging::init_logging(&log_config)?;
    info!("Tabby CLI v{} starting", tabby_core::VERSION);

    let config = load_config(&args)?;
    info!(
        "Using backend: base_url={}, request_timeout_secs={}, idle_timeout_secs={}",
        config.base_url, config.request_timeout_secs, config.idle_timeout_secs
    );
    let transport: Arc<dyn ChatTransport> = Arc::new(HttpChatTransport::new(&config)?);

    if let Some(message) = &args.no_stream {
        return run_one_shot(transport.as_ref(), message).await;
    }
    run_interactive(transport, &config).await
}
