//! Header — 2-row top bar.
//!
//! Row 1: status icon, current channel, group, playback path, health badge.
//! Row 2: error or autoplay notice when there is one, otherwise volume and
//! fullscreen state.
//!
//! Not focusable.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use livetv_proto::protocol::{MpvHealth, PlaybackStatus};

use crate::{
    app_state::AppState,
    theme::{
        status_glyph, C_ACCENT, C_BADGE_ERR, C_BADGE_PENDING, C_ENGINE, C_GROUP, C_MUTED,
        C_PRIMARY, C_SECONDARY,
    },
};

pub fn draw(frame: &mut Frame, area: Rect, state: &AppState) {
    frame.render_widget(Clear, area);
    if area.height < 2 {
        frame.render_widget(Paragraph::new(build_row1(state)), area);
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);
    frame.render_widget(Paragraph::new(build_row1(state)), rows[0]);
    frame.render_widget(Paragraph::new(build_row2(state)), rows[1]);
}

fn health_span(health: &MpvHealth) -> Option<Span<'static>> {
    let label = health.badge_label()?;
    let style = if *health == MpvHealth::Dead {
        Style::default()
            .fg(C_BADGE_ERR)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_BADGE_PENDING)
    };
    Some(Span::styled(format!(" [mpv {}]", label), style))
}

pub fn build_row1(state: &AppState) -> Line<'static> {
    let player = &state.player;
    let mut spans: Vec<Span<'static>> = vec![Span::styled(
        " livetv ",
        Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
    )];

    match player.channel.as_ref() {
        Some(channel) => {
            let (icon, color) = status_glyph(&player.status);
            spans.push(Span::styled(format!("{} ", icon), Style::default().fg(color)));
            spans.push(Span::styled(
                channel.name.clone(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!("  {}", channel.group),
                Style::default().fg(C_GROUP),
            ));
            if player.status != PlaybackStatus::Idle {
                let (label, color) = if player.via_engine {
                    ("engine", C_ENGINE)
                } else {
                    ("native", C_MUTED)
                };
                spans.push(Span::styled(
                    format!("  [{}]", label),
                    Style::default().fg(color),
                ));
            }
        }
        None => spans.push(Span::styled(
            "no channel selected",
            Style::default().fg(C_MUTED),
        )),
    }

    if let Some(span) = health_span(&player.mpv_health) {
        spans.push(span);
    }
    Line::from(spans)
}

pub fn build_row2(state: &AppState) -> Line<'static> {
    let player = &state.player;
    if let Some(err) = player.error.as_ref() {
        return Line::from(vec![
            Span::styled(format!(" {}", err), Style::default().fg(C_BADGE_ERR)),
            Span::styled("  (r to retry)", Style::default().fg(C_MUTED)),
        ]);
    }
    if let Some(reason) = player.autoplay_blocked.as_ref() {
        return Line::from(Span::styled(
            format!(" {}", reason),
            Style::default().fg(C_BADGE_PENDING),
        ));
    }

    let mut spans = vec![Span::styled(
        format!(" vol {:>3}%", (player.volume * 100.0).round() as u32),
        Style::default().fg(C_SECONDARY),
    )];
    if player.fullscreen {
        spans.push(Span::styled("  fullscreen", Style::default().fg(C_SECONDARY)));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetv_proto::protocol::Channel;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn row1_names_channel_and_path() {
        let mut state = AppState::new(1.0);
        assert!(text(&build_row1(&state)).contains("no channel selected"));
        state.player.channel = Some(Channel {
            id: 0,
            name: "BBC News".into(),
            group: "News".into(),
            url: "http://x".into(),
            logo: String::new(),
        });
        state.player.status = PlaybackStatus::Playing;
        state.player.via_engine = true;
        let row = text(&build_row1(&state));
        assert!(row.contains("BBC News"));
        assert!(row.contains("[engine]"));
    }

    #[test]
    fn row2_prefers_error() {
        let mut state = AppState::new(0.5);
        assert!(text(&build_row2(&state)).contains("50%"));
        state.player.error = Some("stream failed: 404".into());
        assert!(text(&build_row2(&state)).contains("stream failed: 404"));
    }
}
