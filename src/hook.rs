//! Agent lifecycle hooks.
//!
//! Each hook fires as a separate process, possibly out of order with its
//! neighbours. Every transition therefore looks only at the state currently
//! persisted for the window, never at what was "supposed" to happen before.
//!
//! | current | idle        | busy    | prompt | remove |
//! |---------|-------------|---------|--------|--------|
//! | unset   | idle        | busy    | busy   | unset  |
//! | idle    | idle (age 0)| ignored | busy   | unset  |
//! | busy    | idle        | busy    | busy   | unset  |

use anyhow::Result;
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::queue::RETURN_TO_KEY;
use crate::switcher::Switcher;
use crate::tmux::{self, Multiplexer, WindowId};

const DETACH: &str = "__detach__";

/// Failures that stop a hook before it touches any state
#[derive(Debug, Error)]
pub enum HookError {
    #[error("TMUX_PANE not set (not running inside tmux?)")]
    NoPane,
    #[error("no active {0} session")]
    NoSession(String),
    #[error("invalid pane handle {0:?}")]
    BadPane(String),
    #[error("pane {pane} belongs to session {session:?}, not {expected:?}")]
    OutsideSession {
        pane: String,
        session: String,
        expected: String,
    },
    #[error("failed to resolve window from pane {pane}: {source}")]
    Unresolved {
        pane: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Lifecycle signal delivered by the agent's hook configuration
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Agent is waiting for input
    Idle,
    /// Agent resumed work (e.g., after a permission prompt)
    Busy,
    /// User submitted a prompt
    Prompt,
    /// Agent session ended
    Remove,
}

/// Where to send the user once a freshly added window finishes setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnTarget {
    /// Go back to the window that was active before the add
    Window(WindowId),
    /// Detach the client that ran the add, or every client when unknown
    Detach { tty: Option<String> },
}

impl fmt::Display for ReturnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnTarget::Window(id) => write!(f, "{}", id),
            ReturnTarget::Detach { tty: Some(tty) } => write!(f, "{}:{}", DETACH, tty),
            ReturnTarget::Detach { tty: None } => f.write_str(DETACH),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised return target {0:?}")]
pub struct ParseReturnTargetError(String);

impl FromStr for ReturnTarget {
    type Err = ParseReturnTargetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == DETACH {
            return Ok(ReturnTarget::Detach { tty: None });
        }
        if let Some(tty) = raw.strip_prefix(DETACH).and_then(|r| r.strip_prefix(':')) {
            let tty = (!tty.is_empty()).then(|| tty.to_string());
            return Ok(ReturnTarget::Detach { tty });
        }
        WindowId::parse(raw)
            .map(ReturnTarget::Window)
            .ok_or_else(|| ParseReturnTargetError(raw.to_string()))
    }
}

/// What a hook ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State updated and the view moved to another window
    Switched,
    /// State updated, view unchanged
    Stayed,
    /// First idle after setup: sent the user back instead of queueing
    Returned(ReturnTarget),
    /// Signal was stale and dropped
    Ignored,
    /// Window state removed
    Cleared,
}

impl Outcome {
    fn from_switch(switched: bool) -> Self {
        if switched {
            Outcome::Switched
        } else {
            Outcome::Stayed
        }
    }
}

/// Map a pane handle from the environment to its window
pub async fn resolve_window<M: Multiplexer>(
    mux: &M,
    pane: Option<&str>,
) -> Result<WindowId, HookError> {
    let pane = pane.filter(|p| !p.is_empty()).ok_or(HookError::NoPane)?;
    if !tmux::is_pane_id(pane) {
        return Err(HookError::BadPane(pane.to_string()));
    }
    if !mux.has_session().await {
        return Err(HookError::NoSession(mux.session().to_string()));
    }
    let location = mux
        .pane_location(pane)
        .await
        .map_err(|source| HookError::Unresolved {
            pane: pane.to_string(),
            source,
        })?;
    // Agent hooks are usually global, so they also fire in unrelated sessions
    if location.session != mux.session() {
        return Err(HookError::OutsideSession {
            pane: pane.to_string(),
            session: location.session,
            expected: mux.session().to_string(),
        });
    }
    Ok(location.window)
}

pub struct HookHandler<'a, M> {
    mux: &'a M,
    switcher: Switcher<'a, M>,
}

impl<'a, M: Multiplexer> HookHandler<'a, M> {
    pub fn new(mux: &'a M) -> Self {
        Self {
            mux,
            switcher: Switcher::new(mux),
        }
    }

    pub async fn handle(&self, action: HookAction, window: &WindowId) -> Result<Outcome> {
        let outcome = match action {
            HookAction::Idle => self.on_idle(window).await?,
            HookAction::Busy => self.on_busy(window).await?,
            HookAction::Prompt => self.on_prompt_submit(window).await?,
            HookAction::Remove => self.on_remove(window).await,
        };
        info!(window = %window, action = ?action, outcome = ?outcome, "hook:handled");
        Ok(outcome)
    }

    pub async fn on_idle(&self, window: &WindowId) -> Result<Outcome> {
        let target = self.return_target(window).await;
        self.switcher.queue().mark_idle(window).await?;

        match target {
            Some(target) => {
                self.go_back(&target).await;
                self.mux.unset_window_option(window, RETURN_TO_KEY).await?;
                Ok(Outcome::Returned(target))
            }
            None => Ok(Outcome::from_switch(self.switcher.try_switch().await)),
        }
    }

    pub async fn on_busy(&self, window: &WindowId) -> Result<Outcome> {
        // A busy racing in behind a newer idle would requeue a waiting agent
        if self.switcher.queue().is_idle(window).await {
            debug!(window = %window, "hook:busy_ignored");
            return Ok(Outcome::Ignored);
        }
        self.switcher.queue().mark_busy(window).await?;
        Ok(Outcome::from_switch(self.switcher.try_switch().await))
    }

    pub async fn on_prompt_submit(&self, window: &WindowId) -> Result<Outcome> {
        self.switcher.queue().mark_busy(window).await?;
        Ok(Outcome::from_switch(self.switcher.try_switch().await))
    }

    /// Forget a closed window. The window may already be gone, so failures
    /// are only logged.
    pub async fn on_remove(&self, window: &WindowId) -> Outcome {
        if let Err(e) = self.switcher.queue().clear(window).await {
            debug!(window = %window, error = %e, "hook:remove_cleanup_failed");
        }
        Outcome::Cleared
    }

    async fn return_target(&self, window: &WindowId) -> Option<ReturnTarget> {
        let raw = self.mux.window_option(window, RETURN_TO_KEY).await?;
        match raw.parse() {
            Ok(target) => Some(target),
            Err(e) => {
                warn!(window = %window, error = %e, "hook:bad_return_target");
                let _ = self.mux.unset_window_option(window, RETURN_TO_KEY).await;
                None
            }
        }
    }

    async fn go_back(&self, target: &ReturnTarget) {
        let result = match target {
            ReturnTarget::Window(id) => self.mux.select_window(id).await,
            ReturnTarget::Detach { tty } => self.mux.detach_client(tty.as_deref()).await,
        };
        if let Err(e) = result {
            warn!(target = %target, error = %e, "hook:return_failed");
        }
    }
}
