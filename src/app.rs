use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::actions::Action;
use crate::queue::AgentState;
use crate::status::{format_duration, WindowStatus};

/// Below this width the detail pane is dropped so the list fits a side pane
const DETAIL_MIN_WIDTH: u16 = 60;

/// Theme colors inspired by Claude Code
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87), // Claude orange
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

/// Dashboard state
pub struct App {
    /// Windows of the session, in tmux order
    pub windows: Vec<WindowStatus>,
    /// Currently selected row
    pub list_state: ListState,
    /// Whether auto-switch was on at the last refresh
    pub auto_switch: bool,
    /// Current message to display (info or error)
    pub message: Option<String>,
    /// Theme
    pub theme: Theme,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            windows: Vec::new(),
            list_state,
            auto_switch: false,
            message: None,
            theme: Theme::default(),
            pending_actions: Vec::new(),
        }
    }

    /// Get the currently selected window
    pub fn selected_window(&self) -> Option<&WindowStatus> {
        self.list_state
            .selected()
            .and_then(|i| self.windows.get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::WindowsUpdated {
                windows,
                auto_switch,
            } => {
                self.windows = windows;
                self.auto_switch = auto_switch;
                // Ensure selection is valid
                if let Some(selected) = self.list_state.selected() {
                    if selected >= self.windows.len() && !self.windows.is_empty() {
                        self.list_state.select(Some(self.windows.len() - 1));
                    }
                }
                Ok(false)
            }
            Action::Error(msg) => {
                self.message = Some(msg);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        self.message = None;

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Char('j') | KeyCode::Down => self.next_window(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_window(),
            KeyCode::Enter => {
                if let Some(window) = self.selected_window() {
                    self.pending_actions
                        .push(Action::SelectWindow(window.id.clone()));
                }
            }
            KeyCode::Char('a') => self.pending_actions.push(Action::ToggleAutoSwitch),
            _ => {}
        }
        Ok(false)
    }

    fn next_window(&mut self) {
        if self.windows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.windows.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous_window(&mut self) {
        if self.windows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.windows.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    fn state_style(&self, state: Option<AgentState>) -> (&'static str, Style) {
        match state {
            Some(AgentState::Idle) => ("○ ", Style::default().fg(self.theme.success)),
            Some(AgentState::Busy) => ("● ", Style::default().fg(self.theme.warning)),
            None => ("· ", Style::default().fg(self.theme.dim)),
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let (mode, color) = if self.auto_switch {
            ("AUTO", self.theme.success)
        } else {
            ("MANUAL", self.theme.warning)
        };
        let idle = self
            .windows
            .iter()
            .filter(|w| w.state == Some(AgentState::Idle))
            .count();

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                " agentq ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("{} ", mode), Style::default().fg(color)),
            Span::styled(
                format!("│ {}/{} idle", idle, self.windows.len()),
                Style::default().fg(self.theme.dim),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        if area.width < DETAIL_MIN_WIDTH {
            self.render_window_list(frame, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40), // Window list
                Constraint::Percentage(60), // Detail pane
            ])
            .split(area);

        self.render_window_list(frame, chunks[0]);
        self.render_detail_pane(frame, chunks[1]);
    }

    fn render_window_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.windows.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  No windows",
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.windows
                .iter()
                .map(|window| {
                    let (icon, style) = self.state_style(window.state);
                    let mut spans = vec![
                        Span::styled(icon, style),
                        Span::styled(
                            format!("{}:{}", window.index, window.dir_name()),
                            if window.active {
                                Style::default()
                                    .fg(self.theme.accent)
                                    .add_modifier(Modifier::BOLD)
                            } else {
                                Style::default().fg(self.theme.fg)
                            },
                        ),
                    ];
                    if let Some(d) = window.idle_for {
                        spans.push(Span::styled(
                            format!(" {}", format_duration(d)),
                            Style::default().fg(self.theme.dim),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Windows ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.dim)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(50, 50, 50))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_detail_pane(&self, frame: &mut Frame, area: Rect) {
        let label = |text: &'static str| Span::styled(text, Style::default().fg(self.theme.dim));

        let content = if let Some(window) = self.selected_window() {
            let (_, style) = self.state_style(window.state);
            let state = window.state.map_or("unknown", AgentState::as_str);
            vec![
                Line::from(vec![
                    label("Window: "),
                    Span::styled(
                        format!("#{} ({})", window.index, window.id),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
                Line::from(vec![label("State: "), Span::styled(state, style)]),
                Line::from(vec![
                    label("Idle for: "),
                    Span::styled(
                        window
                            .idle_for
                            .map(format_duration)
                            .unwrap_or_else(|| "-".to_string()),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
                Line::from(vec![
                    label("Directory: "),
                    Span::styled(
                        window.path.display().to_string(),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Enter to switch to this window",
                    Style::default().fg(self.theme.dim),
                )),
            ]
        } else {
            vec![Line::from(Span::styled(
                "No window selected",
                Style::default().fg(self.theme.dim),
            ))]
        };

        let detail = Paragraph::new(content).block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(detail, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ j/k: Navigate │ Enter: Switch │ a: Auto-switch ";

        let content = if let Some(ref msg) = self.message {
            let style = if msg.starts_with("Auto-switch") {
                Style::default().fg(self.theme.success)
            } else {
                Style::default().fg(self.theme.error)
            };
            Line::from(Span::styled(format!(" {} ", msg), style))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::WindowId;
    use std::path::PathBuf;
    use std::time::Duration;

    fn window(index: u32, state: Option<AgentState>) -> WindowStatus {
        WindowStatus {
            id: WindowId::parse(&format!("@{}", index + 10)).unwrap(),
            index,
            active: index == 0,
            state,
            idle_for: (state == Some(AgentState::Idle)).then(|| Duration::from_secs(30)),
            path: PathBuf::from(format!("/work/w{}", index)),
        }
    }

    fn key(code: KeyCode) -> Action {
        Action::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn loaded() -> App {
        let mut app = App::new();
        app.handle_action(Action::WindowsUpdated {
            windows: vec![
                window(0, Some(AgentState::Busy)),
                window(1, Some(AgentState::Idle)),
                window(2, None),
            ],
            auto_switch: true,
        })
        .unwrap();
        app
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = loaded();
        app.handle_action(key(KeyCode::Char('k'))).unwrap();
        assert_eq!(app.list_state.selected(), Some(2));
        app.handle_action(key(KeyCode::Char('j'))).unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
        app.handle_action(key(KeyCode::Down)).unwrap();
        assert_eq!(app.selected_window().unwrap().index, 1);
    }

    #[test]
    fn test_enter_queues_window_selection() {
        let mut app = loaded();
        app.handle_action(key(KeyCode::Char('j'))).unwrap();
        app.handle_action(key(KeyCode::Enter)).unwrap();

        let pending = app.take_pending_actions();
        assert!(matches!(
            pending.as_slice(),
            [Action::SelectWindow(id)] if id.as_str() == "@11"
        ));
        assert!(app.take_pending_actions().is_empty());
    }

    #[test]
    fn test_toggle_and_quit_keys() {
        let mut app = loaded();
        assert!(!app.handle_action(key(KeyCode::Char('a'))).unwrap());
        assert!(matches!(
            app.take_pending_actions().as_slice(),
            [Action::ToggleAutoSwitch]
        ));
        assert!(app.handle_action(key(KeyCode::Char('q'))).unwrap());
        assert!(app
            .handle_action(Action::KeyPress(KeyEvent::new(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL
            )))
            .unwrap());
    }

    #[test]
    fn test_selection_clamped_when_windows_close() {
        let mut app = loaded();
        app.list_state.select(Some(2));
        app.handle_action(Action::WindowsUpdated {
            windows: vec![window(0, None)],
            auto_switch: false,
        })
        .unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
        assert!(!app.auto_switch);
    }

    #[test]
    fn test_error_shown_until_next_key() {
        let mut app = loaded();
        app.handle_action(Action::Error("tmux: gone".to_string()))
            .unwrap();
        assert_eq!(app.message.as_deref(), Some("tmux: gone"));
        app.handle_action(key(KeyCode::Char('j'))).unwrap();
        assert_eq!(app.message, None);
    }
}
