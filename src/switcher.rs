//! Auto-switch policy: move the user to the oldest idle window whenever the
//! window they are on is not itself waiting for them.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::queue::Queue;
use crate::tmux::Multiplexer;

pub const AUTO_SWITCH_KEY: &str = "@agentq_auto_switch";

pub struct Switcher<'a, M> {
    mux: &'a M,
    queue: Queue<'a, M>,
}

impl<'a, M: Multiplexer> Switcher<'a, M> {
    pub fn new(mux: &'a M) -> Self {
        Self {
            mux,
            queue: Queue::new(mux),
        }
    }

    pub fn queue(&self) -> &Queue<'a, M> {
        &self.queue
    }

    pub async fn set_auto_switch(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "on" } else { "off" };
        info!(auto_switch = value, "switcher:set");
        self.mux.set_session_option(AUTO_SWITCH_KEY, value).await
    }

    pub async fn is_auto_switch_on(&self) -> bool {
        self.mux.session_option(AUTO_SWITCH_KEY).await.as_deref() == Some("on")
    }

    /// Flip the flag, returning the new value. Turning it on checks the
    /// queue straight away.
    pub async fn toggle(&self) -> Result<bool> {
        let enabled = !self.is_auto_switch_on().await;
        self.set_auto_switch(enabled).await?;
        if enabled {
            self.try_switch().await;
        }
        Ok(enabled)
    }

    /// Select the oldest idle window if the policy allows it.
    ///
    /// Never leaves a window that is itself idle: the user may be typing there.
    pub async fn try_switch(&self) -> bool {
        if !self.is_auto_switch_on().await {
            debug!("switcher:off");
            return false;
        }

        let active = match self.mux.active_window().await {
            Ok(active) => active,
            Err(e) => {
                debug!(error = %e, "switcher:no_active_window");
                return false;
            }
        };

        if self.queue.is_idle(&active).await {
            debug!(active = %active, "switcher:active_is_idle");
            return false;
        }

        let target = match self.queue.oldest_idle().await {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!("switcher:queue_empty");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "switcher:scan_failed");
                return false;
            }
        };

        match self.mux.select_window(&target).await {
            Ok(()) => {
                info!(from = %active, to = %target, "switcher:switched");
                true
            }
            Err(e) => {
                warn!(target = %target, error = %e, "switcher:select_failed");
                false
            }
        }
    }
}
