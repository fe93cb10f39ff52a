use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::Config;
use crate::session::{self, Caller, CONFIG_VERSION, PREFIX_CHOICES, SESSION_NAME};
use crate::tmux::{Multiplexer, TmuxClient};

/// `agentq` with no subcommand: create the session on first use, otherwise
/// add a window for the current directory.
pub async fn run() -> Result<()> {
    let client = TmuxClient::locate(SESSION_NAME)?;
    if client.has_session().await {
        return add_to(&client).await;
    }

    let path = Config::default_path();
    let mut config = Config::load(&path).context("Failed to load config")?;
    if config.prefix.is_empty() {
        config.prefix = prompt_prefix()?;
        config.save(&path).context("Failed to save config")?;
    }

    session::create(&client, &config, &super::bin()).await?;
    attach_or_switch(&client)
}

/// Add a window to an existing session
pub async fn add() -> Result<()> {
    let client = super::connect().await?;
    add_to(&client).await
}

/// Attach to the session without creating anything
pub async fn attach() -> Result<()> {
    let client = super::connect().await?;
    attach_or_switch(&client)
}

pub async fn kill() -> Result<()> {
    let client = super::connect().await?;
    client.kill_session().await?;
    println!("Session '{}' killed", SESSION_NAME);
    Ok(())
}

async fn add_to(client: &TmuxClient) -> Result<()> {
    if let Some(from) = session::migrate_settings(client, &super::bin()).await? {
        println!(
            "✓ {} settings updated (v{} → v{})",
            SESSION_NAME, from, CONFIG_VERSION
        );
    }

    let config = Config::load(&Config::default_path()).context("Failed to load config")?;
    let in_tmux = super::in_tmux();
    let caller = Caller {
        cwd: std::env::current_dir().context("Failed to get working directory")?,
        in_tmux,
        tty: if in_tmux { None } else { controlling_tty() },
    };

    let window = session::add_window(client, &config, &caller).await?;
    println!("Added window {} ({})", window, caller.cwd.display());

    if !in_tmux {
        // Blocks until the window's first idle hook detaches this client
        run_interactive(&client.attach_command())?;
    }
    Ok(())
}

fn attach_or_switch(client: &TmuxClient) -> Result<()> {
    let cmd = if super::in_tmux() {
        client.switch_client_command()
    } else {
        client.attach_command()
    };
    run_interactive(&cmd)
}

/// Run a command on the user's terminal and wait for it
fn run_interactive(cmd: &[String]) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        bail!("empty command");
    };
    debug!(cmd = ?cmd, "exec");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if !status.success() {
        bail!("{} exited with {}", cmd.join(" "), status);
    }
    Ok(())
}

/// The terminal this process is attached to, as reported by `tty`
fn controlling_tty() -> Option<String> {
    let output = Command::new("tty")
        .stdin(Stdio::inherit())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let tty = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!tty.is_empty()).then_some(tty)
}

fn prompt_prefix() -> Result<String> {
    println!(
        "Choose the tmux prefix key for {} (avoids clashing with Ctrl+B in the agent):",
        SESSION_NAME
    );
    for (i, (_, label)) in PREFIX_CHOICES.iter().enumerate() {
        println!("  {}) {}", i + 1, label);
    }
    print!("  Choice [1]: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(parse_prefix_choice(&line).to_string())
}

fn parse_prefix_choice(input: &str) -> &'static str {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| PREFIX_CHOICES.get(i))
        .map_or(PREFIX_CHOICES[0].0, |&(key, _)| key)
}
