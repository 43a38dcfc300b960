//! PlayerPanel — details of the attached channel next to the list.
//!
//! The video itself lives in the mpv window; this pane reports what the
//! session is doing with it.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use livetv_proto::protocol::PlaybackStatus;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    theme::{
        status_glyph, C_BADGE_ERR, C_BADGE_LIVE, C_BADGE_PENDING, C_GROUP, C_MUTED, C_PRIMARY,
        C_SECONDARY, C_URL,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

#[derive(Default)]
pub struct PlayerPanel;

fn field<'a>(label: &'a str, value: String, color: ratatui::style::Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!(" {:<8}", label), Style::default().fg(C_MUTED)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

pub fn detail_lines(state: &AppState) -> Vec<Line<'static>> {
    let player = &state.player;
    let Some(channel) = player.channel.as_ref() else {
        return vec![
            Line::from(""),
            Line::from(Span::styled(
                " nothing playing: pick a channel and press Enter",
                Style::default().fg(C_MUTED),
            )),
        ];
    };

    let (icon, color) = status_glyph(&player.status);
    let status = match player.status {
        PlaybackStatus::Idle => "idle",
        PlaybackStatus::Attaching => "attaching",
        PlaybackStatus::Playing => "playing",
        PlaybackStatus::Failed => "failed",
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {}", channel.name),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        field("status", format!("{} {}", icon, status), color),
        field("group", channel.group.clone(), C_GROUP),
        field(
            "path",
            if player.via_engine {
                "ffmpeg relay".to_string()
            } else {
                "native hls".to_string()
            },
            C_SECONDARY,
        ),
        field("url", channel.url.clone(), C_URL),
    ];
    if !channel.logo.is_empty() {
        lines.push(field("logo", channel.logo.clone(), C_SECONDARY));
    }
    if let Some(err) = player.error.as_ref() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", err),
            Style::default().fg(C_BADGE_ERR),
        )));
        lines.push(Line::from(Span::styled(
            " press r to retry",
            Style::default().fg(C_MUTED),
        )));
    }
    if let Some(reason) = player.autoplay_blocked.as_ref() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", reason),
            Style::default().fg(C_BADGE_PENDING),
        )));
    }
    lines
}

impl Component for PlayerPanel {
    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let badge = match state.player.status {
            PlaybackStatus::Playing => Some(Badge {
                text: "LIVE",
                color: C_BADGE_LIVE,
            }),
            PlaybackStatus::Attaching => Some(Badge {
                text: "…",
                color: C_BADGE_PENDING,
            }),
            PlaybackStatus::Failed => Some(Badge {
                text: "ERR",
                color: C_BADGE_ERR,
            }),
            PlaybackStatus::Idle => None,
        };
        let block = pane_chrome("player", None, focused, badge);
        frame.render_widget(
            Paragraph::new(detail_lines(state))
                .block(block)
                .wrap(Wrap { trim: false }),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetv_proto::protocol::Channel;

    fn joined(lines: &[Line]) -> String {
        lines
            .iter()
            .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn failed_channel_offers_retry() {
        let mut state = AppState::new(1.0);
        state.player.channel = Some(Channel {
            id: 1,
            name: "CNN".into(),
            group: "News".into(),
            url: "http://cnn/live.m3u8".into(),
            logo: String::new(),
        });
        state.player.status = PlaybackStatus::Failed;
        state.player.error = Some("stream failed: 403".into());
        let text = joined(&detail_lines(&state));
        assert!(text.contains("http://cnn/live.m3u8"));
        assert!(text.contains("failed"));
        assert!(text.contains("press r to retry"));
        assert!(!text.contains("logo"));
    }

    #[test]
    fn idle_panel_prompts() {
        let state = AppState::new(1.0);
        assert!(joined(&detail_lines(&state)).contains("press Enter"));
    }
}
