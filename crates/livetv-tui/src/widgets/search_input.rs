//! SearchInput — wraps tui-input for the channel search bar.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_FILTER_BG, C_FILTER_FG, C_MUTED};

#[derive(Debug, PartialEq)]
pub enum SearchEvent {
    Changed(String),
    Confirmed,
    Cancelled,
}

pub struct SearchInput {
    input: Input,
    active: bool,
    placeholder: String,
}

impl SearchInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            active: false,
            placeholder: placeholder.into(),
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc clears the text first; a second Esc on an empty bar closes it
    /// and keeps nothing.  Enter closes and keeps the query.
    pub fn handle_key(&mut self, key: KeyEvent) -> SearchEvent {
        match key.code {
            KeyCode::Esc if !self.input.value().is_empty() => {
                self.input = Input::default();
                SearchEvent::Changed(String::new())
            }
            KeyCode::Esc => {
                self.deactivate();
                SearchEvent::Cancelled
            }
            KeyCode::Enter => {
                self.deactivate();
                SearchEvent::Confirmed
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                SearchEvent::Changed(self.input.value().to_string())
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(4) as usize);
        let value = self.input.value();
        let display = if value.is_empty() {
            Span::styled(
                format!("/ {}", self.placeholder),
                Style::default().fg(C_MUTED),
            )
        } else {
            let shown: String = value.chars().skip(scroll).collect();
            Span::styled(format!("/ {}", shown), Style::default().fg(C_FILTER_FG))
        };

        let paragraph =
            Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_FILTER_BG));
        frame.render_widget(paragraph, area);

        if self.active && area.width > 0 {
            let cursor_x = area.x + 2 + (self.input.visual_cursor() - scroll) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width - 1), area.y));
        }
    }
}
