//! Help overlay — centered popup with the keyboard reference.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::theme::{C_MUTED, C_PANEL_BORDER, C_PRIMARY, C_SECONDARY};

pub fn draw(frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = vec![
        Line::from(Span::styled(
            " keyboard shortcuts",
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        section(" channels"),
        help_row("↑ / ↓  or  k / j", "move cursor (Shift = 5 rows)"),
        help_row("pg up / pg dn", "move 10 rows"),
        help_row("home / end  or  g / G", "first / last row"),
        help_row("enter", "watch channel under cursor"),
        help_row("n / p", "next / previous channel"),
        help_row("J", "cursor to current channel"),
        help_row("tab / shift-tab", "next / previous category"),
        help_row("/", "search (Esc clears, then closes)"),
        help_row("y", "copy stream url"),
        Line::from(""),
        section(" playback"),
        help_row("f", "toggle fullscreen"),
        help_row("r", "retry after an error"),
        help_row("s", "stop"),
        help_row("- / +", "volume down / up"),
        Line::from(""),
        section(" app"),
        help_row("esc", "toggle channel panel"),
        help_row("R", "reload playlist"),
        help_row("?", "toggle this help"),
        help_row("q / Ctrl+C", "quit"),
    ];

    let popup = centered_rect(60, lines.len() as u16 + 2, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_PANEL_BORDER))
                    .style(Style::default().bg(Color::Rgb(18, 18, 26))),
            )
            .wrap(Wrap { trim: false }),
        popup,
    );
}

fn section(title: &str) -> Line<'_> {
    Line::from(Span::styled(
        title,
        Style::default().fg(C_MUTED).add_modifier(Modifier::BOLD),
    ))
}

fn help_row<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{:<22}", key),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc, Style::default().fg(C_SECONDARY)),
    ])
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1])[1]
}
