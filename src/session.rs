//! Session lifecycle: creating the tmux session, keeping its settings current
//! across upgrades, and adding agent windows to it.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::hook::ReturnTarget;
use crate::queue::RETURN_TO_KEY;
use crate::switcher::{Switcher, AUTO_SWITCH_KEY};
use crate::tmux::{Multiplexer, WindowId};

pub const SESSION_NAME: &str = "agentq";

/// Bump whenever `apply_versioned_settings` changes
pub const CONFIG_VERSION: &str = "1";

pub const CONFIG_VERSION_KEY: &str = "@agentq_config_version";

/// Prefix keys offered on first run, in menu order
pub const PREFIX_CHOICES: [(&str, &str); 3] = [
    ("C-Space", "Ctrl+Space (recommended)"),
    ("C-\\", "Ctrl+\\"),
    ("C-a", "Ctrl+A"),
];

/// Who is asking for a new window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Directory the new agent should start in
    pub cwd: PathBuf,
    /// Running inside a tmux client already
    pub in_tmux: bool,
    /// Controlling terminal, when known
    pub tty: Option<String>,
}

impl Caller {
    /// Where the first idle of a window added by this caller should lead
    pub fn return_target(&self, previous: Option<WindowId>) -> ReturnTarget {
        match previous {
            Some(id) if self.in_tmux => ReturnTarget::Window(id),
            _ => ReturnTarget::Detach {
                tty: self.tty.clone(),
            },
        }
    }
}

/// Create the session, configure it and start an agent in its first window
pub async fn create<M: Multiplexer>(mux: &M, config: &Config, bin: &str) -> Result<()> {
    mux.new_session().await?;

    if let Err(e) = init_settings(mux, &config.prefix, bin).await {
        let _ = mux.kill_session().await;
        return Err(e);
    }

    if let Some(first) = mux.list_windows().await?.into_iter().next() {
        mux.send_keys(&first.id, &config.agent_command, true)
            .await
            .context("Failed to start the agent")?;
    }

    info!(session = mux.session(), "session:created");
    Ok(())
}

/// Settings applied once, when the session is first created
pub async fn init_settings<M: Multiplexer>(mux: &M, prefix: &str, bin: &str) -> Result<()> {
    Switcher::new(mux).set_auto_switch(true).await?;
    mux.set_session_option("remain-on-exit", "off").await?;
    mux.set_session_option("prefix", prefix)
        .await
        .with_context(|| format!("Failed to set prefix key {:?}", prefix))?;
    apply_versioned_settings(mux, bin).await?;
    mux.set_session_option(CONFIG_VERSION_KEY, CONFIG_VERSION).await
}

/// Re-apply versioned settings on an older session. Prefix, auto-switch and
/// remain-on-exit are left as the user has them. Returns the version the
/// session was on when it was migrated.
pub async fn migrate_settings<M: Multiplexer>(mux: &M, bin: &str) -> Result<Option<String>> {
    let current = mux.session_option(CONFIG_VERSION_KEY).await;
    if current.as_deref() == Some(CONFIG_VERSION) {
        return Ok(None);
    }

    let from = current.unwrap_or_else(|| "0".to_string());
    info!(from = %from, to = CONFIG_VERSION, "session:migrate");
    apply_versioned_settings(mux, bin).await?;
    mux.set_session_option(CONFIG_VERSION_KEY, CONFIG_VERSION)
        .await?;
    Ok(Some(from))
}

async fn apply_versioned_settings<M: Multiplexer>(mux: &M, bin: &str) -> Result<()> {
    let status_left = format!(
        "[#{{?#{{==:#{{{}}},on}},AUTO,MANUAL}}] ",
        AUTO_SWITCH_KEY
    );
    let state = "#{?#{@agentq_state}, #{@agentq_state},}";
    let settings = [
        ("status-left", status_left),
        ("status-right", "#{session_windows} windows".to_string()),
        ("status-style", "bg=colour236,fg=colour248".to_string()),
        (
            "window-status-current-format",
            format!("#[fg=colour214,bold]#I:#{{b:pane_current_path}}{}", state),
        ),
        (
            "window-status-format",
            format!("#I:#{{b:pane_current_path}}{}", state),
        ),
        // Second status line is the queue overview
        ("status", "2".to_string()),
        ("status-interval", "2".to_string()),
        (
            "status-format[1]",
            format!("#[align=left]#({} _status)", bin),
        ),
    ];

    for (key, value) in &settings {
        mux.set_session_option(key, value).await?;
    }

    mux.bind_key("a", &format!("{} _toggle", bin)).await?;
    mux.bind_key("g", &format!("{} toggle-dashboard", bin)).await?;
    Ok(())
}

/// Open a window for `caller`, start the agent in it and focus it so the user
/// can get through the agent's startup prompts. The window remembers where
/// the user came from; its first idle hook sends them back.
pub async fn add_window<M: Multiplexer>(
    mux: &M,
    config: &Config,
    caller: &Caller,
) -> Result<WindowId> {
    let previous = match mux.active_window().await {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(error = %e, "session:no_active_window");
            None
        }
    };

    let window = mux.new_window(&caller.cwd).await?;
    mux.send_keys(&window, &config.agent_command, true)
        .await
        .context("Failed to start the agent")?;

    let target = caller.return_target(previous);
    if let Err(e) = mux
        .set_window_option(&window, RETURN_TO_KEY, &target.to_string())
        .await
    {
        warn!(window = %window, error = %e, "session:return_target_not_set");
    }

    mux.select_window(&window).await?;
    info!(window = %window, cwd = %caller.cwd.display(), return_to = %target, "session:window_added");
    Ok(window)
}
