use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{
    parse_pane_line, parse_window_line, Multiplexer, MuxError, PaneLocation, Window, WindowId,
};

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Session every command is scoped to
    session: String,
}

impl TmuxClient {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            tmux_path: "tmux".to_string(),
            session: session.into(),
        }
    }

    /// Locate the tmux binary on PATH
    pub fn locate(session: impl Into<String>) -> Result<Self> {
        let path = which::which("tmux").context("tmux is not installed or not on PATH")?;
        let mut client = Self::new(session);
        client.tmux_path = path.to_string_lossy().into_owned();
        Ok(client)
    }

    /// Run a tmux command and return its trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        debug!(args = ?args, "tmux");
        let output = Command::new(&self.tmux_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MuxError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a tmux command whose output only matters when it succeeds
    async fn query(&self, args: &[&str]) -> Option<String> {
        self.run(args).await.ok().filter(|out| !out.is_empty())
    }

    /// `detach-client` for one terminal, or for every client of the session
    fn detach_args<'a>(&'a self, tty: Option<&'a str>) -> [&'a str; 3] {
        match tty {
            Some(tty) => ["detach-client", "-t", tty],
            None => ["detach-client", "-s", self.session.as_str()],
        }
    }

    /// Split the active window, running `command` in a `width`-column pane
    /// on the right. Returns the new pane's ID.
    pub async fn split_dashboard(&self, width: u16, command: &str) -> Result<String> {
        let width = width.to_string();
        let pane = self
            .run(&[
                "split-window",
                "-h",
                "-d",
                "-l",
                &width,
                "-t",
                &self.session,
                "-P",
                "-F",
                "#{pane_id}",
                command,
            ])
            .await
            .context("Failed to create dashboard pane")?;

        if pane.is_empty() {
            anyhow::bail!("tmux did not report the dashboard pane ID");
        }
        Ok(pane)
    }

    /// Check whether a pane still exists
    pub async fn pane_exists(&self, pane: &str) -> bool {
        self.run(&["display-message", "-t", pane, "-p", "#{pane_id}"])
            .await
            .is_ok()
    }

    /// Kill a pane
    pub async fn kill_pane(&self, pane: &str) -> Result<()> {
        self.run(&["kill-pane", "-t", pane])
            .await
            .context("Failed to kill pane")?;
        Ok(())
    }

    /// Get the command to attach to the session (for external execution)
    pub fn attach_command(&self) -> Vec<String> {
        vec![
            self.tmux_path.clone(),
            "attach-session".to_string(),
            "-t".to_string(),
            self.session.clone(),
        ]
    }

    /// Get the command to move the current client to the session
    pub fn switch_client_command(&self) -> Vec<String> {
        vec![
            self.tmux_path.clone(),
            "switch-client".to_string(),
            "-t".to_string(),
            self.session.clone(),
        ]
    }
}

impl Multiplexer for TmuxClient {
    fn session(&self) -> &str {
        &self.session
    }

    async fn has_session(&self) -> bool {
        Command::new(&self.tmux_path)
            .args(["has-session", "-t", &self.session])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn new_session(&self) -> Result<()> {
        self.run(&["new-session", "-d", "-s", &self.session])
            .await
            .context("Failed to create tmux session")?;
        Ok(())
    }

    async fn kill_session(&self) -> Result<()> {
        self.run(&["kill-session", "-t", &self.session])
            .await
            .context("Failed to kill tmux session")?;
        Ok(())
    }

    async fn new_window(&self, dir: &Path) -> Result<WindowId> {
        let dir = dir.to_string_lossy();
        let target = format!("{}:", self.session);
        let out = self
            .run(&[
                "new-window",
                "-d",
                "-t",
                &target,
                "-c",
                &dir,
                "-P",
                "-F",
                "#{window_id}",
            ])
            .await
            .context("Failed to create window")?;

        Ok(WindowId::parse(&out).ok_or(MuxError::BadWindowId(out))?)
    }

    async fn list_windows(&self) -> Result<Vec<Window>> {
        let stdout = self
            .run(&[
                "list-windows",
                "-t",
                &self.session,
                "-F",
                "#{window_id}\t#{window_index}\t#{window_active}\t#{pane_current_path}",
            ])
            .await
            .context("Failed to list windows")?;

        Ok(stdout.lines().filter_map(parse_window_line).collect())
    }

    async fn select_window(&self, id: &WindowId) -> Result<()> {
        self.run(&["select-window", "-t", id.as_str()])
            .await
            .with_context(|| format!("Failed to select window {}", id))?;
        Ok(())
    }

    async fn active_window(&self) -> Result<WindowId> {
        let out = self
            .run(&[
                "display-message",
                "-t",
                &self.session,
                "-p",
                "#{window_id}",
            ])
            .await
            .context("Failed to query the active window")?;

        Ok(WindowId::parse(&out).ok_or(MuxError::BadWindowId(out))?)
    }

    async fn pane_location(&self, pane: &str) -> Result<PaneLocation> {
        let out = self
            .run(&[
                "display-message",
                "-t",
                pane,
                "-p",
                "#{session_name}\t#{window_id}",
            ])
            .await
            .with_context(|| format!("Failed to resolve window for pane {}", pane))?;

        Ok(parse_pane_line(&out).ok_or(MuxError::BadPaneLocation(out))?)
    }

    async fn window_option(&self, id: &WindowId, key: &str) -> Option<String> {
        self.query(&["show-options", "-w", "-v", "-t", id.as_str(), key])
            .await
    }

    async fn set_window_option(&self, id: &WindowId, key: &str, value: &str) -> Result<()> {
        self.run(&["set-option", "-w", "-t", id.as_str(), key, value])
            .await
            .with_context(|| format!("Failed to set {} on window {}", key, id))?;
        Ok(())
    }

    async fn unset_window_option(&self, id: &WindowId, key: &str) -> Result<()> {
        self.run(&["set-option", "-w", "-u", "-t", id.as_str(), key])
            .await
            .with_context(|| format!("Failed to unset {} on window {}", key, id))?;
        Ok(())
    }

    async fn session_option(&self, key: &str) -> Option<String> {
        self.query(&["show-options", "-v", "-t", &self.session, key])
            .await
    }

    async fn set_session_option(&self, key: &str, value: &str) -> Result<()> {
        self.run(&["set-option", "-t", &self.session, key, value])
            .await
            .with_context(|| format!("Failed to set session option {}", key))?;
        Ok(())
    }

    async fn list_clients(&self) -> Vec<String> {
        self.query(&[
            "list-clients",
            "-t",
            &self.session,
            "-F",
            "#{client_tty}",
        ])
        .await
        .map(|out| {
            out.lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }

    async fn send_keys(&self, target: &WindowId, keys: &str, enter: bool) -> Result<()> {
        self.run(&["send-keys", "-t", target.as_str(), "-l", keys])
            .await
            .with_context(|| format!("Failed to send keys to {}", target))?;
        if enter {
            self.run(&["send-keys", "-t", target.as_str(), "Enter"])
                .await
                .with_context(|| format!("Failed to send Enter to {}", target))?;
        }
        Ok(())
    }

    async fn detach_client(&self, tty: Option<&str>) -> Result<()> {
        self.run(&self.detach_args(tty))
            .await
            .context("Failed to detach client")?;
        Ok(())
    }

    async fn bind_key(&self, key: &str, command: &str) -> Result<()> {
        self.run(&["bind-key", "-T", "prefix", key, "run-shell", command])
            .await
            .with_context(|| format!("Failed to bind prefix {}", key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{resolve_window, HookError, HookHandler, Outcome};
    use crate::queue::{AgentState, Queue, IDLE_SINCE_KEY, STATE_KEY};
    use crate::switcher::Switcher;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT_SESSION: AtomicU32 = AtomicU32::new(0);

    /// A uniquely named session on the local tmux server, killed on drop
    struct Scratch {
        client: TmuxClient,
    }

    impl Scratch {
        /// `None` when tmux is not installed
        async fn start() -> Option<Self> {
            let name = format!(
                "agentq-test-{}-{}",
                std::process::id(),
                NEXT_SESSION.fetch_add(1, Ordering::SeqCst)
            );
            let client = TmuxClient::locate(name).ok()?;
            client.new_session().await.unwrap();
            Some(Self { client })
        }

        async fn pane_of(&self, window: &WindowId) -> String {
            self.client
                .run(&["display-message", "-t", window.as_str(), "-p", "#{pane_id}"])
                .await
                .unwrap()
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::process::Command::new(&self.client.tmux_path)
                .args(["kill-session", "-t", &self.client.session])
                .output();
        }
    }

    macro_rules! scratch_or_skip {
        () => {
            match Scratch::start().await {
                Some(scratch) => scratch,
                None => {
                    eprintln!("tmux not found, skipping");
                    return;
                }
            }
        };
    }

    #[test]
    fn test_detach_args() {
        let client = TmuxClient::new("agentq");
        assert_eq!(
            client.detach_args(Some("/dev/pts/4")),
            ["detach-client", "-t", "/dev/pts/4"]
        );
        assert_eq!(client.detach_args(None), ["detach-client", "-s", "agentq"]);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let s = scratch_or_skip!();
        assert!(s.client.has_session().await);
        assert!(s.client.new_session().await.is_err());
        assert!(s.client.list_clients().await.is_empty());

        s.client.kill_session().await.unwrap();
        assert!(!s.client.has_session().await);
    }

    #[tokio::test]
    async fn test_window_options_roundtrip() {
        let s = scratch_or_skip!();
        let w = s.client.active_window().await.unwrap();

        // Unset user options read as absent, not as an error or ""
        assert_eq!(s.client.window_option(&w, STATE_KEY).await, None);

        s.client.set_window_option(&w, STATE_KEY, "idle").await.unwrap();
        assert_eq!(
            s.client.window_option(&w, STATE_KEY).await.as_deref(),
            Some("idle")
        );

        s.client.unset_window_option(&w, STATE_KEY).await.unwrap();
        assert_eq!(s.client.window_option(&w, STATE_KEY).await, None);
        // Unsetting twice is harmless
        s.client.unset_window_option(&w, STATE_KEY).await.unwrap();

        assert_eq!(s.client.session_option("@agentq_test_flag").await, None);
        s.client
            .set_session_option("@agentq_test_flag", "on")
            .await
            .unwrap();
        assert_eq!(
            s.client.session_option("@agentq_test_flag").await.as_deref(),
            Some("on")
        );
    }

    #[tokio::test]
    async fn test_windows_and_selection() {
        let s = scratch_or_skip!();
        let first = s.client.active_window().await.unwrap();

        // Created detached: the active window does not change
        let second = s.client.new_window(Path::new("/tmp")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(s.client.active_window().await.unwrap(), first);

        let windows = s.client.list_windows().await.unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].id, first);
        assert!(windows[0].active);
        assert_eq!(windows[1].id, second);
        assert!(!windows[1].active);
        assert!(windows[0].index < windows[1].index);

        s.client.select_window(&second).await.unwrap();
        assert_eq!(s.client.active_window().await.unwrap(), second);

        let gone = WindowId::parse("@999999").unwrap();
        assert!(s.client.select_window(&gone).await.is_err());
        assert!(s.client.set_window_option(&gone, STATE_KEY, "idle").await.is_err());
    }

    #[tokio::test]
    async fn test_pane_resolution_is_scoped_to_session() {
        let own = scratch_or_skip!();
        let other = scratch_or_skip!();
        let w = own.client.active_window().await.unwrap();
        let foreign = other.client.active_window().await.unwrap();

        let pane = own.pane_of(&w).await;
        let location = own.client.pane_location(&pane).await.unwrap();
        assert_eq!(location.session, own.client.session());
        assert_eq!(resolve_window(&own.client, Some(pane.as_str())).await.unwrap(), w);

        let foreign_pane = other.pane_of(&foreign).await;
        assert!(matches!(
            resolve_window(&own.client, Some(foreign_pane.as_str())).await,
            Err(HookError::OutsideSession { .. })
        ));
        assert!(matches!(
            resolve_window(&own.client, Some("%999999")).await,
            Err(HookError::Unresolved { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_switch_scenario() {
        let s = scratch_or_skip!();
        let mux = &s.client;
        let w0 = mux.active_window().await.unwrap();
        let w1 = mux.new_window(Path::new("/tmp")).await.unwrap();
        Switcher::new(mux).set_auto_switch(true).await.unwrap();
        let hooks = HookHandler::new(mux);
        let queue = Queue::new(mux);

        // User prompts in w0 while nothing else waits
        assert_eq!(hooks.on_prompt_submit(&w0).await.unwrap(), Outcome::Stayed);

        // w1 finishes: the user is moved there
        assert_eq!(hooks.on_idle(&w1).await.unwrap(), Outcome::Switched);
        assert_eq!(mux.active_window().await.unwrap(), w1);
        assert!(queue.state(&w1).await.idle_since > 0);

        // User answers w1; w0 is still busy so nowhere to go
        assert_eq!(hooks.on_prompt_submit(&w1).await.unwrap(), Outcome::Stayed);

        // w0 finishes while the user watches busy w1
        assert_eq!(hooks.on_idle(&w0).await.unwrap(), Outcome::Switched);
        assert_eq!(mux.active_window().await.unwrap(), w0);

        // Stale busy behind the idle is dropped
        assert_eq!(hooks.on_busy(&w0).await.unwrap(), Outcome::Ignored);
        assert_eq!(queue.state(&w0).await.state, Some(AgentState::Idle));

        assert_eq!(hooks.on_remove(&w1).await, Outcome::Cleared);
        assert_eq!(mux.window_option(&w1, STATE_KEY).await, None);
        assert_eq!(mux.window_option(&w1, IDLE_SINCE_KEY).await, None);
    }
}
