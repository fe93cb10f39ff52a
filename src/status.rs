//! Read-only views of the session: per-window status rows, the one-line
//! status bar and the detailed `agentq status` report.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::queue::{self, AgentState, Queue};
use crate::switcher::Switcher;
use crate::tmux::{Multiplexer, WindowId};

/// Snapshot of one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    pub id: WindowId,
    pub index: u32,
    pub active: bool,
    /// `None` until a hook has fired for the window
    pub state: Option<AgentState>,
    /// How long the window has been idle, in whole seconds
    #[serde(serialize_with = "serialize_secs")]
    pub idle_for: Option<Duration>,
    pub path: PathBuf,
}

fn serialize_secs<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

/// Snapshot of the whole session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session: String,
    pub auto_switch: bool,
    pub clients: usize,
    pub windows: Vec<WindowStatus>,
}

impl WindowStatus {
    /// Last path component, or "~" when there is nothing better
    pub fn dir_name(&self) -> String {
        dir_name(&self.path)
    }
}

fn dir_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) if path != home().as_path() => name.to_string_lossy().into_owned(),
        _ => "~".to_string(),
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

/// Collect a status row for every window, reading state as of `now`
pub async fn collect<M: Multiplexer>(mux: &M, now: i64) -> Result<Vec<WindowStatus>> {
    let queue = Queue::new(mux);
    let mut rows = Vec::new();

    for window in mux.list_windows().await? {
        let state = queue.state(&window.id).await;
        let idle_for = state
            .idle_candidate()
            .map(|since| Duration::from_secs(now.saturating_sub(since).max(0) as u64));

        rows.push(WindowStatus {
            id: window.id,
            index: window.index,
            active: window.active,
            state: state.state,
            idle_for,
            path: window.path,
        });
    }

    Ok(rows)
}

/// Collect the session-wide view used by `agentq status`
pub async fn session_status<M: Multiplexer>(mux: &M) -> Result<SessionStatus> {
    let windows = collect(mux, queue::now()).await?;
    Ok(SessionStatus {
        session: mux.session().to_string(),
        auto_switch: Switcher::new(mux).is_auto_switch_on().await,
        clients: mux.list_clients().await.len(),
        windows,
    })
}

/// Compact age: 42s, 7m, 3h
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

/// One line for the tmux status bar. The idle count only covers windows
/// waiting in the background: the one on screen already has the user.
pub fn render_status_line(rows: &[WindowStatus]) -> String {
    let mut idle = 0;
    let parts: Vec<String> = rows
        .iter()
        .map(|row| {
            let mut suffix = String::new();
            let icon = if row.active {
                "▶"
            } else {
                match row.state {
                    Some(AgentState::Idle) => {
                        idle += 1;
                        if let Some(d) = row.idle_for {
                            suffix = format!(" {}", format_duration(d));
                        }
                        "○"
                    }
                    Some(AgentState::Busy) => "●",
                    None => "·",
                }
            };
            format!("{} {}:{}{}", icon, row.index, row.dir_name(), suffix)
        })
        .collect();

    format!("{}    {}/{} idle", parts.join(" | "), idle, rows.len())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Replace a leading home directory with "~"
fn shorten_home(path: &Path, home: &Path) -> String {
    if home.as_os_str().is_empty() {
        return path.display().to_string();
    }
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

/// Multi-line report for `agentq status`
pub fn render_session_status(status: &SessionStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {}, {} attached, auto-switch {}",
        status.session,
        plural(status.windows.len(), "window"),
        plural(status.clients, "client"),
        if status.auto_switch { "on" } else { "off" },
    );

    if status.windows.is_empty() {
        return out;
    }
    out.push('\n');

    let home = home();
    for row in &status.windows {
        let state = row.state.map_or("-", AgentState::as_str);
        let idle = row.idle_for.map(format_duration).unwrap_or_default();
        let _ = writeln!(
            out,
            "  #{:<3} {:<15} {:<6} {:>6}   {}",
            row.index,
            row.dir_name(),
            state,
            idle,
            shorten_home(&row.path, &home),
        );
    }

    out
}
