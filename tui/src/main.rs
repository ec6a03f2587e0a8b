//! Tutor TUI Entry Point
//!
//! Usage:
//!   tutor-tui [OPTIONS] [chat]
//!   tutor-tui [OPTIONS] artifact --prompt <TEXT> [--type report|slides]
//!                                [--edit <TEXT>]... [--out <FILE>]
//!                                [--export <TITLE>] [--params <JSON>]
//!
//! Options:
//!   --relay-url <URL>   Relay daemon (default http://127.0.0.1:3000)
//!   --state-dir <DIR>   Conversation state and logs
//!
//! Logs go to `<state-dir>/logs/tutor-tui.log`; set `RUST_LOG` for detail.

use std::io::{self, IsTerminal, Write};
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

use relay_core::ArtifactType;
use tutor_tui::{App, ArtifactSession, ClientConfig, PublishScheduler, RelayClient, StateStore, TutorSession};

/// Terminal client for the tutor relay
#[derive(Debug, Parser)]
#[command(name = "tutor-tui", version, about)]
struct Cli {
    /// Relay daemon base URL
    #[arg(long, global = true)]
    relay_url: Option<String>,

    /// Directory for conversation state and logs
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat with the tutor (default)
    Chat,
    /// Generate a report or slide deck without the full-screen UI
    Artifact(ArtifactArgs),
}

#[derive(Debug, Args)]
struct ArtifactArgs {
    /// What to generate
    #[arg(long)]
    prompt: String,

    /// Artifact kind: report or slides
    #[arg(long = "type", default_value = "slides")]
    kind: ArtifactType,

    /// Edit instruction applied after generation (repeatable, in order)
    #[arg(long)]
    edit: Vec<String>,

    /// Write the final markup to this file instead of stdout only
    #[arg(long)]
    out: Option<PathBuf>,

    /// Export a PDF named after this title into the current directory
    #[arg(long)]
    export: Option<String>,

    /// Export parameters as JSON (default: the artifact markup)
    #[arg(long, requires = "export")]
    params: Option<String>,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(url) = &self.relay_url {
            config.relay_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir.clone_from(dir);
        }
        config
    }
}

/// Log to a file; the terminal belongs to the UI
fn init_logging(config: &ClientConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = config.state_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(&log_dir, "tutor-tui.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tutor_tui=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.client_config();
    let _log_guard = init_logging(&config)?;
    tracing::info!(relay = %config.relay_url, "tutor-tui starting");

    match cli.command {
        None | Some(Command::Chat) => run_chat(config).await,
        Some(Command::Artifact(args)) => run_artifact(config, args).await,
    }
}

async fn run_chat(config: ClientConfig) -> anyhow::Result<()> {
    // Check if we have a TTY before attempting initialization
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: tutor-tui chat requires a terminal (TTY)");
        eprintln!();
        eprintln!("For non-interactive use try:");
        eprintln!("  tutor-tui artifact --prompt \"...\"");
        std::process::exit(1);
    }

    let session = TutorSession::load(
        StateStore::new(&config.state_dir),
        RelayClient::new(config.relay_url.clone()),
    )
    .await;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(config, session);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

async fn run_artifact(config: ClientConfig, args: ArtifactArgs) -> anyhow::Result<()> {
    let mut session = ArtifactSession::new(RelayClient::new(config.relay_url.clone()));
    let scheduler = PublishScheduler::new();
    let cancel = CancellationToken::new();
    let mut stdout = io::stdout();
    let mut printed = 0;

    let generated = {
        let generate = session.generate(&args.prompt, args.kind, &scheduler, &cancel);
        tokio::pin!(generate);
        let result = loop {
            tokio::select! {
                result = &mut generate => break result,
                () = scheduler.ready() => {
                    if let Some(snapshot) = scheduler.take() {
                        printed = print_new_text(&mut stdout, &snapshot, printed)?;
                    }
                }
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
            }
        };
        result.map(|doc| doc.is_some())?
    };
    if let Some(snapshot) = scheduler.take() {
        print_new_text(&mut stdout, &snapshot, printed)?;
    }
    writeln!(stdout)?;

    if !generated {
        eprintln!("Generation cancelled");
        return Ok(());
    }

    for instruction in &args.edit {
        let document = session.edit(instruction).await?;
        eprintln!("--- edited: {instruction}");
        writeln!(stdout, "{}", document.content())?;
    }

    let Some(document) = session.document() else {
        return Ok(());
    };
    if let Some(path) = &args.out {
        tokio::fs::write(path, document.content())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Saved {} ({})", path.display(), document.id());
    }

    if let Some(title) = &args.export {
        let params = match &args.params {
            Some(raw) => serde_json::from_str(raw).context("--params is not valid JSON")?,
            None => serde_json::Value::String(document.content().to_string()),
        };
        let path = session
            .export_pdf(&params, title, &std::env::current_dir()?)
            .await?;
        eprintln!("Exported {}", path.display());
    }

    Ok(())
}

/// Print the part of `snapshot` past `printed` bytes; returns the new offset
fn print_new_text(out: &mut impl Write, snapshot: &str, printed: usize) -> io::Result<usize> {
    let new_text = snapshot.get(printed..).unwrap_or(snapshot);
    out.write_all(new_text.as_bytes())?;
    out.flush()?;
    Ok(snapshot.len())
}
