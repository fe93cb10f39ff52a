mod client;
#[cfg(test)]
pub mod fake;

pub use client::TmuxClient;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

static RE_WINDOW_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@\d+$").unwrap());

static RE_PANE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^%\d+$").unwrap());

/// Errors raised by the tmux gateway itself
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("failed to run tmux: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("tmux {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
    #[error("tmux returned an unexpected window id: {0:?}")]
    BadWindowId(String),
    #[error("tmux returned an unexpected pane location: {0:?}")]
    BadPaneLocation(String),
}

/// Opaque tmux window identifier (e.g., "@3"), stable for the window's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    /// Parse a window id, rejecting anything that is not `@N`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        RE_WINDOW_ID.is_match(raw).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a pane handle (as found in `TMUX_PANE`) looks like `%N`
pub fn is_pane_id(raw: &str) -> bool {
    RE_PANE_ID.is_match(raw)
}

/// Represents a tmux window inside the managed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Window ID (e.g., "@0")
    pub id: WindowId,
    /// User-visible index, reused after removal
    pub index: u32,
    /// Whether this is the session's active window
    pub active: bool,
    /// Working directory of the window's first pane
    pub path: PathBuf,
}

/// Where a pane lives: its session and window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneLocation {
    pub session: String,
    pub window: WindowId,
}

/// The capability set the queue, switcher and hook handler need from a
/// terminal multiplexer.
///
/// Option reads never fail: a missing option, a vanished window or a failed
/// query all come back as `None`. Writes return errors so state transitions
/// can be checked by the caller.
#[allow(async_fn_in_trait)]
pub trait Multiplexer {
    /// Name of the session this gateway is bound to
    fn session(&self) -> &str;

    async fn has_session(&self) -> bool;
    async fn new_session(&self) -> Result<()>;
    async fn kill_session(&self) -> Result<()>;

    /// Create a detached window running the default shell in `dir`
    async fn new_window(&self, dir: &Path) -> Result<WindowId>;
    async fn list_windows(&self) -> Result<Vec<Window>>;
    async fn select_window(&self, id: &WindowId) -> Result<()>;
    async fn active_window(&self) -> Result<WindowId>;
    /// Session and window of any pane on the server, not only this session's
    async fn pane_location(&self, pane: &str) -> Result<PaneLocation>;

    async fn window_option(&self, id: &WindowId, key: &str) -> Option<String>;
    async fn set_window_option(&self, id: &WindowId, key: &str, value: &str) -> Result<()>;
    async fn unset_window_option(&self, id: &WindowId, key: &str) -> Result<()>;

    async fn session_option(&self, key: &str) -> Option<String>;
    async fn set_session_option(&self, key: &str, value: &str) -> Result<()>;

    /// TTYs of the clients attached to the session
    async fn list_clients(&self) -> Vec<String>;

    /// Type `keys` literally into `target`, optionally followed by Enter
    async fn send_keys(&self, target: &WindowId, keys: &str, enter: bool) -> Result<()>;

    /// Detach the client on `tty`, or every client of the session when `None`
    async fn detach_client(&self, tty: Option<&str>) -> Result<()>;

    /// Bind `key` in the prefix table to a shell command
    async fn bind_key(&self, key: &str, command: &str) -> Result<()>;
}

/// Parse one line of `list-windows` output
///
/// Format: window_id \t window_index \t window_active \t pane_current_path
pub(crate) fn parse_window_line(line: &str) -> Option<Window> {
    let mut parts = line.splitn(4, '\t');
    let id = WindowId::parse(parts.next()?)?;
    let index = parts.next()?.parse().ok()?;
    let active = parts.next()? == "1";
    let path = PathBuf::from(parts.next().unwrap_or_default());

    Some(Window {
        id,
        index,
        active,
        path,
    })
}

/// Parse `session_name \t window_id`. Session names may contain tabs; the
/// window ID never does.
pub(crate) fn parse_pane_line(line: &str) -> Option<PaneLocation> {
    let (session, window) = line.rsplit_once('\t')?;
    Some(PaneLocation {
        session: session.to_string(),
        window: WindowId::parse(window)?,
    })
}
