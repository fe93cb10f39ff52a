use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::actions::Action;
use crate::app::App;
use crate::config::Config;
use crate::queue;
use crate::status::collect;
use crate::switcher::Switcher;
use crate::tmux::{Multiplexer, TmuxClient};

/// Session option holding the ID of the dashboard side pane
const DASHBOARD_PANE_KEY: &str = "@agentq_dashboard_pane";

/// Run the interactive dashboard until the user quits or the session ends
pub async fn run() -> Result<()> {
    let config = Config::load(&Config::default_path())?;
    let client = super::connect().await?;

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press && tx.send(Action::KeyPress(key)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.dashboard.refresh_secs.max(1)));
    let mut app = App::new();

    // Main event loop
    let result = loop {
        terminal.draw(|f| app.render(f))?;

        // Process any pending actions from the app
        let pending = app.take_pending_actions();
        let refresh_now = !pending.is_empty();
        for action in pending {
            match action {
                Action::SelectWindow(ref id) => {
                    if let Err(e) = client.select_window(id).await {
                        app.message = Some(format!("Failed to switch: {}", e));
                    }
                }
                Action::ToggleAutoSwitch => match Switcher::new(&client).toggle().await {
                    Ok(enabled) => {
                        app.message = Some(format!(
                            "Auto-switch {}",
                            if enabled { "on" } else { "off" }
                        ));
                    }
                    Err(e) => {
                        app.message = Some(format!("Failed to toggle: {}", e));
                    }
                },
                _ => {}
            }
        }
        if refresh_now {
            ticker.reset_immediately();
        }

        // Handle events from channel
        tokio::select! {
            Some(action) = rx.recv() => {
                match app.handle_action(action) {
                    Ok(true) => break Ok(()),
                    Ok(false) => {}
                    Err(e) => break Err(e),
                }
            }
            _ = ticker.tick() => {
                if !client.has_session().await {
                    break Ok(());
                }
                let action = refresh(&client).await;
                if let Err(e) = app.handle_action(action) {
                    break Err(e);
                }
            }
        }
    };

    // Restore terminal
    ratatui::restore();
    result
}

async fn refresh(client: &TmuxClient) -> Action {
    match collect(client, queue::now()).await {
        Ok(windows) => Action::WindowsUpdated {
            windows,
            auto_switch: Switcher::new(client).is_auto_switch_on().await,
        },
        Err(e) => Action::Error(format!("tmux: {}", e)),
    }
}

/// Show the dashboard in a side pane, or close it if it is already open
pub async fn toggle_pane() -> Result<()> {
    let config = Config::load(&Config::default_path())?;
    let client = super::connect().await?;

    if let Some(pane) = client.session_option(DASHBOARD_PANE_KEY).await {
        if client.pane_exists(&pane).await {
            debug!(pane = %pane, "dashboard:close");
            client.kill_pane(&pane).await?;
            client.set_session_option(DASHBOARD_PANE_KEY, "").await?;
            return Ok(());
        }
    }

    let command = format!("{} dashboard", super::bin());
    let pane = client
        .split_dashboard(config.dashboard.width, &command)
        .await?;
    debug!(pane = %pane, "dashboard:open");
    client.set_session_option(DASHBOARD_PANE_KEY, &pane).await
}
