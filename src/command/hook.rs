use anyhow::Result;

use crate::hook::{resolve_window, HookAction, HookHandler};
use crate::session::SESSION_NAME;
use crate::tmux::TmuxClient;

/// Entry point for the agent's lifecycle hooks
pub async fn run(action: HookAction) -> Result<()> {
    let client = TmuxClient::locate(SESSION_NAME)?;
    let pane = std::env::var("TMUX_PANE").ok();
    let window = resolve_window(&client, pane.as_deref()).await?;

    HookHandler::new(&client).handle(action, &window).await?;
    Ok(())
}
