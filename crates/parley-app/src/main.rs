//! Parley application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Install tracing on stderr
//! 3. Build the HTTP answering service, attachment loader and session
//! 4. Run one `--prompt` turn, or the interactive loop on stdin

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;
use parley_chat::{AttachmentLoader, ChatSession, HttpAnswerService, SessionOptions};
use parley_core::{ParleyConfig, Preferences};
use parley_ui::TranscriptRenderer;

use cli::CliArgs;
use repl::Repl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. Stdout carries the transcript, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Preferences.
    let prefs_path = cli::prefs_path();
    let prefs = Preferences::load(&prefs_path);
    config.ui.theme = args.resolve_theme(&prefs, config.ui.theme);

    // Service + session.
    let service = HttpAnswerService::new(&config.service)?;
    tracing::info!(url = %service.ask_url(), mode = %config.chat.behavior_mode, "Answering service configured");

    let session = ChatSession::new(service, SessionOptions::from(&config));
    let loader = Arc::new(AttachmentLoader::new(config.attachments.max_bytes));

    // One-shot mode.
    if let Some(prompt) = args.prompt {
        let outcome = session.submit(&prompt, Some(loader.as_ref())).await?;
        for line in TranscriptRenderer::default().render(&session.messages()) {
            println!("{}", line);
        }
        if !outcome.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Interactive loop.
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut repl = Repl::new(session, loader, std::io::stdout()).with_prefs_path(prefs_path);
    repl.run(stdin).await?;

    tracing::info!("Parley exiting");
    Ok(())
}
