//! In-memory multiplexer used by unit tests.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Multiplexer, PaneLocation, Window, WindowId};

#[derive(Default)]
struct FakeState {
    alive: bool,
    next_id: u32,
    windows: Vec<Window>,
    window_options: HashMap<(WindowId, String), String>,
    session_options: HashMap<String, String>,
    clients: Vec<String>,
    detached: Vec<Option<String>>,
    sent_keys: Vec<(WindowId, String)>,
    bindings: Vec<(String, String)>,
    selections: usize,
    /// Panes belonging to other sessions on the same server
    foreign_panes: HashMap<String, PaneLocation>,
}

/// A single tmux session held entirely in memory
pub struct FakeMux {
    session: String,
    state: Mutex<FakeState>,
}

impl FakeMux {
    /// A live session with one active window in /tmp
    pub fn new() -> Self {
        let mux = Self::empty();
        mux.state.lock().unwrap().alive = true;
        mux.add_window("/tmp");
        mux
    }

    /// No session at all
    pub fn empty() -> Self {
        Self {
            session: "agentq-test".to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Append a window; the first one becomes active
    pub fn add_window(&self, path: &str) -> WindowId {
        let mut state = self.state.lock().unwrap();
        let id = WindowId(format!("@{}", state.next_id));
        let index = state.windows.iter().map(|w| w.index + 1).max().unwrap_or(0);
        state.next_id += 1;
        let active = state.windows.is_empty();
        state.windows.push(Window {
            id: id.clone(),
            index,
            active,
            path: PathBuf::from(path),
        });
        id
    }

    /// Drop a window as if its process exited
    pub fn close_window(&self, id: &WindowId) {
        let mut state = self.state.lock().unwrap();
        state.windows.retain(|w| &w.id != id);
        state.window_options.retain(|(w, _), _| w != id);
    }

    /// Register a pane that lives in some other session on the server
    pub fn add_foreign_pane(&self, pane: &str, session: &str, window: &str) {
        let location = PaneLocation {
            session: session.to_string(),
            window: WindowId(window.to_string()),
        };
        self.state
            .lock()
            .unwrap()
            .foreign_panes
            .insert(pane.to_string(), location);
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let state = self.state.lock().unwrap();
        state.windows.iter().map(|w| w.id.clone()).collect()
    }

    pub fn active(&self) -> Option<WindowId> {
        let state = self.state.lock().unwrap();
        state.windows.iter().find(|w| w.active).map(|w| w.id.clone())
    }

    pub fn attach_client(&self, tty: &str) {
        self.state.lock().unwrap().clients.push(tty.to_string());
    }

    pub fn detached(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().detached.clone()
    }

    pub fn sent_keys(&self) -> Vec<(WindowId, String)> {
        self.state.lock().unwrap().sent_keys.clone()
    }

    pub fn bindings(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().bindings.clone()
    }

    /// Number of successful select-window calls
    pub fn selections(&self) -> usize {
        self.state.lock().unwrap().selections
    }

    /// Raw option lookup, bypassing the trait
    pub fn raw_window_option(&self, id: &WindowId, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .window_options
            .get(&(id.clone(), key.to_string()))
            .cloned()
    }
}

impl Multiplexer for FakeMux {
    fn session(&self) -> &str {
        &self.session
    }

    async fn has_session(&self) -> bool {
        self.state.lock().unwrap().alive
    }

    async fn new_session(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.alive {
                bail!("duplicate session: {}", self.session);
            }
            state.alive = true;
        }
        self.add_window("/tmp");
        Ok(())
    }

    async fn kill_session(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.alive {
            bail!("can't find session: {}", self.session);
        }
        *state = FakeState::default();
        Ok(())
    }

    async fn new_window(&self, dir: &Path) -> Result<WindowId> {
        if !self.state.lock().unwrap().alive {
            bail!("can't find session: {}", self.session);
        }
        Ok(self.add_window(&dir.to_string_lossy()))
    }

    async fn list_windows(&self) -> Result<Vec<Window>> {
        let state = self.state.lock().unwrap();
        if !state.alive {
            bail!("can't find session: {}", self.session);
        }
        Ok(state.windows.clone())
    }

    async fn select_window(&self, id: &WindowId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.windows.iter().any(|w| &w.id == id) {
            bail!("can't find window: {}", id);
        }
        for w in state.windows.iter_mut() {
            w.active = &w.id == id;
        }
        state.selections += 1;
        Ok(())
    }

    async fn active_window(&self) -> Result<WindowId> {
        match self.active() {
            Some(id) => Ok(id),
            None => bail!("no current window"),
        }
    }

    async fn pane_location(&self, pane: &str) -> Result<PaneLocation> {
        let state = self.state.lock().unwrap();
        if let Some(location) = state.foreign_panes.get(pane) {
            return Ok(location.clone());
        }
        // Own panes are numbered like their windows: %N lives in @N
        let id = WindowId(pane.replacen('%', "@", 1));
        if !state.windows.iter().any(|w| w.id == id) {
            bail!("can't find pane: {}", pane);
        }
        Ok(PaneLocation {
            session: self.session.clone(),
            window: id,
        })
    }

    async fn window_option(&self, id: &WindowId, key: &str) -> Option<String> {
        self.raw_window_option(id, key).filter(|v| !v.is_empty())
    }

    async fn set_window_option(&self, id: &WindowId, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.windows.iter().any(|w| &w.id == id) {
            bail!("can't find window: {}", id);
        }
        state
            .window_options
            .insert((id.clone(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn unset_window_option(&self, id: &WindowId, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.windows.iter().any(|w| &w.id == id) {
            bail!("can't find window: {}", id);
        }
        state.window_options.remove(&(id.clone(), key.to_string()));
        Ok(())
    }

    async fn session_option(&self, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .session_options
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    async fn set_session_option(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.alive {
            bail!("can't find session: {}", self.session);
        }
        state
            .session_options
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_clients(&self) -> Vec<String> {
        self.state.lock().unwrap().clients.clone()
    }

    async fn send_keys(&self, target: &WindowId, keys: &str, enter: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut typed = keys.to_string();
        if enter {
            typed.push('\n');
        }
        state.sent_keys.push((target.clone(), typed));
        Ok(())
    }

    async fn detach_client(&self, tty: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match tty {
            Some(tty) => state.clients.retain(|c| c != tty),
            None => state.clients.clear(),
        }
        state.detached.push(tty.map(str::to_string));
        Ok(())
    }

    async fn bind_key(&self, key: &str, command: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .bindings
            .push((key.to_string(), command.to_string()));
        Ok(())
    }
}
