use anyhow::Result;

use crate::queue;
use crate::session::SESSION_NAME;
use crate::status::{collect, render_session_status, render_status_line, session_status};
use crate::tmux::{Multiplexer, TmuxClient};

/// Detailed report for the terminal
pub async fn run(json: bool) -> Result<()> {
    let client = super::connect().await?;
    let status = session_status(&client).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_session_status(&status));
    }
    Ok(())
}

/// One-line summary for the tmux status bar. Prints nothing without a session.
pub async fn run_line() -> Result<()> {
    let client = TmuxClient::locate(SESSION_NAME)?;
    if !client.has_session().await {
        return Ok(());
    }

    let rows = collect(&client, queue::now()).await?;
    print!("{}", render_status_line(&rows));
    Ok(())
}
