pub mod dashboard;
pub mod hook;
pub mod start;
pub mod status;
pub mod toggle;

use anyhow::Result;

use crate::hook::HookError;
use crate::session::SESSION_NAME;
use crate::tmux::{Multiplexer, TmuxClient};

/// Connect to the running session, failing when there is none
pub async fn connect() -> Result<TmuxClient> {
    let client = TmuxClient::locate(SESSION_NAME)?;
    if !client.has_session().await {
        return Err(HookError::NoSession(SESSION_NAME.to_string()).into());
    }
    Ok(client)
}

/// How tmux should invoke this binary from key bindings and status lines
pub fn bin() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| SESSION_NAME.to_string())
}

/// Whether we are running inside a tmux client
pub fn in_tmux() -> bool {
    std::env::var("TMUX").is_ok_and(|v| !v.is_empty())
}
