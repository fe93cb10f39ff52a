//! Per-window busy/idle bookkeeping persisted in tmux window options.
//!
//! Every hook runs as its own short-lived process, so there is no memory to
//! share between invocations: tmux options are the store. Two keys make up a
//! window's state and they are not written atomically, so readers only treat
//! a window as an idle candidate when the flag says idle *and* the timestamp
//! is positive.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::tmux::{Multiplexer, WindowId};

pub const STATE_KEY: &str = "@agentq_state";
pub const IDLE_SINCE_KEY: &str = "@agentq_idle_since";
pub const RETURN_TO_KEY: &str = "@agentq_return_to";

/// What the agent in a window is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Working on something
    Busy,
    /// Waiting for the user
    Idle,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Busy => "busy",
            AgentState::Idle => "idle",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "busy" => Some(AgentState::Busy),
            "idle" => Some(AgentState::Idle),
            _ => None,
        }
    }
}

/// Persisted state of one window; `state == None` means no hook has fired yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowState {
    pub state: Option<AgentState>,
    /// Epoch seconds, 0 when busy or unknown
    pub idle_since: i64,
}

impl WindowState {
    /// Timestamp to queue this window by, if it is a valid idle candidate
    pub fn idle_candidate(&self) -> Option<i64> {
        (self.state == Some(AgentState::Idle) && self.idle_since > 0).then_some(self.idle_since)
    }
}

/// Current time in epoch seconds
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The idle queue, backed by the multiplexer's option store
pub struct Queue<'a, M> {
    mux: &'a M,
}

impl<'a, M: Multiplexer> Queue<'a, M> {
    pub fn new(mux: &'a M) -> Self {
        Self { mux }
    }

    /// Mark a window idle as of now. Re-marking restarts its age.
    pub async fn mark_idle(&self, window: &WindowId) -> Result<()> {
        self.mark_idle_at(window, now()).await
    }

    pub async fn mark_idle_at(&self, window: &WindowId, since: i64) -> Result<()> {
        debug!(window = %window, since, "queue:mark_idle");
        // Timestamp first: a reader never sees "idle" next to a stale age
        self.mux
            .set_window_option(window, IDLE_SINCE_KEY, &since.to_string())
            .await?;
        self.mux
            .set_window_option(window, STATE_KEY, AgentState::Idle.as_str())
            .await
    }

    /// Mark a window busy and zero its idle timestamp
    pub async fn mark_busy(&self, window: &WindowId) -> Result<()> {
        debug!(window = %window, "queue:mark_busy");
        // Flag first: once busy is visible the window stops being a candidate
        self.mux
            .set_window_option(window, STATE_KEY, AgentState::Busy.as_str())
            .await?;
        self.mux.set_window_option(window, IDLE_SINCE_KEY, "0").await
    }

    /// Read both keys of a window. Missing or unreadable keys read as unset.
    pub async fn state(&self, window: &WindowId) -> WindowState {
        let state = self
            .mux
            .window_option(window, STATE_KEY)
            .await
            .and_then(|raw| AgentState::parse(&raw));
        let idle_since = match state {
            Some(AgentState::Idle) => self
                .mux
                .window_option(window, IDLE_SINCE_KEY)
                .await
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0),
            _ => 0,
        };
        WindowState { state, idle_since }
    }

    pub async fn is_idle(&self, window: &WindowId) -> bool {
        self.mux.window_option(window, STATE_KEY).await.as_deref() == Some("idle")
    }

    /// The window that has been waiting longest, if any.
    ///
    /// Ties on the same second go to the window tmux lists first.
    pub async fn oldest_idle(&self) -> Result<Option<WindowId>> {
        let mut oldest: Option<(i64, WindowId)> = None;

        for window in self.mux.list_windows().await? {
            let Some(since) = self.state(&window.id).await.idle_candidate() else {
                continue;
            };
            if oldest.as_ref().map_or(true, |(best, _)| since < *best) {
                oldest = Some((since, window.id));
            }
        }

        Ok(oldest.map(|(_, id)| id))
    }

    /// Remove every key this crate stores on a window. All keys are
    /// attempted; the first failure is returned.
    pub async fn clear(&self, window: &WindowId) -> Result<()> {
        debug!(window = %window, "queue:clear");
        let mut first_err = None;
        for key in [STATE_KEY, IDLE_SINCE_KEY, RETURN_TO_KEY] {
            if let Err(e) = self.mux.unset_window_option(window, key).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
