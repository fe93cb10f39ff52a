use crossterm::event::KeyEvent;

use crate::status::WindowStatus;
use crate::tmux::WindowId;

/// Actions that can be dispatched through the dashboard
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// Window states were refreshed from tmux
    WindowsUpdated {
        windows: Vec<WindowStatus>,
        auto_switch: bool,
    },
    /// An error occurred
    Error(String),
    /// Bring a window to the front
    SelectWindow(WindowId),
    /// Flip auto-switch
    ToggleAutoSwitch,
}
