use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod actions;
mod app;
mod command;
mod config;
mod hook;
mod queue;
mod session;
mod status;
mod switcher;
mod tmux;

use hook::HookAction;

/// Run several AI coding agents side by side in tmux and jump to whichever
/// one is waiting for you.
#[derive(Parser, Debug)]
#[command(name = "agentq", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add an agent window for the current directory
    Add,
    /// Attach to the running session
    Attach,
    /// Show every window with its state and idle time
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Turn auto-switch on or off
    Toggle,
    /// Interactive window dashboard
    Dashboard,
    /// Open or close the dashboard side pane
    ToggleDashboard,
    /// Kill the session and every agent in it
    Kill,
    /// Agent lifecycle hook
    #[command(name = "_hook", hide = true)]
    Hook { action: HookAction },
    /// Status bar line
    #[command(name = "_status", hide = true)]
    StatusLine,
    /// Key binding variant of toggle
    #[command(name = "_toggle", hide = true)]
    ToggleQuiet,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout belongs to tmux status lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AGENTQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => command::start::run().await,
        Some(Commands::Add) => command::start::add().await,
        Some(Commands::Attach) => command::start::attach().await,
        Some(Commands::Status { json }) => command::status::run(json).await,
        Some(Commands::Toggle) => command::toggle::run(false).await,
        Some(Commands::Dashboard) => command::dashboard::run().await,
        Some(Commands::ToggleDashboard) => command::dashboard::toggle_pane().await,
        Some(Commands::Kill) => command::start::kill().await,
        Some(Commands::Hook { action }) => command::hook::run(action).await,
        Some(Commands::StatusLine) => command::status::run_line().await,
        Some(Commands::ToggleQuiet) => command::toggle::run(true).await,
    }
}
