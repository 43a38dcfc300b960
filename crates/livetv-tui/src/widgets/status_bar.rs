//! Status bar — bottom line with the input mode and keybindings.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use livetv_proto::protocol::MpvHealth;

use crate::theme::{
    C_BADGE_ERR, C_BADGE_PENDING, C_MODE_NORMAL, C_MODE_SEARCH, C_MUTED, C_PLAYING,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Search,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "TV",
            Self::Search => "SEARCH",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Search => C_MODE_SEARCH,
        }
    }
}

fn health_color(health: &MpvHealth) -> Color {
    match health {
        MpvHealth::Running => C_PLAYING,
        MpvHealth::Starting => C_BADGE_PENDING,
        MpvHealth::Dead => C_BADGE_ERR,
        MpvHealth::Absent => C_MUTED,
    }
}

/// Draw a horizontal separator line.
/// Draw the keybindings footer bar (one row).  The dot after the mode label
/// shows the health of the player window.
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode, health: &MpvHealth) {
    let keys = match mode {
        InputMode::Normal => {
            " ↑↓/jk move  Enter watch  n/p next/prev  Tab category  / search  f fullscreen  Esc panel  r retry  R reload  s stop  y copy  ? help  q quit"
        }
        InputMode::Search => " type to search  ↑↓ move  Enter keep  Esc clear/close",
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "●",
            Style::default()
                .fg(health_color(health))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(keys, Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
