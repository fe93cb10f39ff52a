use anyhow::Result;

use crate::switcher::Switcher;

/// Flip auto-switch. `quiet` is used by the tmux key binding, where any
/// output would pop up over the user's pane.
pub async fn run(quiet: bool) -> Result<()> {
    let client = super::connect().await?;
    let enabled = Switcher::new(&client).toggle().await?;
    if !quiet {
        println!("auto-switch {}", if enabled { "on" } else { "off" });
    }
    Ok(())
}
