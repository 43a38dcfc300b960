//! ChannelList component — the side panel with the filtered channel view.

use std::time::Instant;

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use livetv_proto::protocol::Channel;

use crate::{
    action::Action,
    app_state::{AppState, LoadPhase},
    component::Component,
    theme::{status_glyph, C_GROUP, C_MUTED, C_PRIMARY, C_SECONDARY, C_SELECTION_BG},
    widgets::{
        pane_chrome::pane_chrome,
        search_input::{SearchEvent, SearchInput},
    },
};

const PAGE: usize = 10;
const DOUBLE_CLICK_MS: u128 = 400;

pub struct ChannelList {
    pub search: SearchInput,
    list_state: ListState,
    last_click: Option<(usize, Instant)>,
}

impl ChannelList {
    pub fn new() -> Self {
        Self {
            search: SearchInput::new("channel name…"),
            list_state: ListState::default(),
            last_click: None,
        }
    }

    fn render_item<'a>(
        &self,
        channel: &'a Channel,
        state: &AppState,
        name_width: usize,
    ) -> ListItem<'a> {
        let is_selected = state
            .nav
            .selected()
            .map_or(false, |sel| sel.id == channel.id);

        let (icon, icon_color) = match state.status_of(channel) {
            Some(status) => status_glyph(status),
            None => (" ", C_MUTED),
        };

        let name_style = if is_selected {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_SECONDARY)
        };

        ListItem::new(Line::from(vec![
            Span::styled(format!(" {} ", icon), Style::default().fg(icon_color)),
            Span::styled(truncate(&channel.name, name_width), name_style),
            Span::raw("  "),
            Span::styled(channel.group.clone(), Style::default().fg(C_GROUP)),
        ]))
    }

    fn empty_message(state: &AppState) -> &'static str {
        if !state.catalog.is_empty() {
            return "  no channels match";
        }
        match state.load_phase {
            LoadPhase::Loading => "  loading playlist…",
            LoadPhase::Loaded | LoadPhase::Empty => "  no channels available (R to reload)",
        }
    }
}

impl Default for ChannelList {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to `width` terminal columns, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

impl Component for ChannelList {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        match key.code {
            KeyCode::Tab => return vec![Action::CycleCategory],
            KeyCode::BackTab => return vec![Action::CycleCategoryBack],
            _ => {}
        }

        if self.search.is_active() {
            match key.code {
                KeyCode::Up => return vec![Action::FocusUp(1)],
                KeyCode::Down => return vec![Action::FocusDown(1)],
                _ => {}
            }
            return match self.search.handle_key(key) {
                SearchEvent::Changed(q) => vec![Action::QueryChanged(q)],
                SearchEvent::Confirmed => vec![Action::CloseSearch],
                SearchEvent::Cancelled => {
                    vec![Action::QueryChanged(String::new()), Action::CloseSearch]
                }
            };
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => vec![Action::FocusUp(step)],
            KeyCode::Down | KeyCode::Char('j') => vec![Action::FocusDown(step)],
            KeyCode::PageUp => vec![Action::FocusUp(PAGE)],
            KeyCode::PageDown => vec![Action::FocusDown(PAGE)],
            KeyCode::Home | KeyCode::Char('g') => vec![Action::FocusFirst],
            KeyCode::End | KeyCode::Char('G') => vec![Action::FocusLast],
            KeyCode::Char('J') => vec![Action::JumpToCurrent],
            KeyCode::Enter => vec![Action::Confirm],
            KeyCode::Char('/') => {
                self.search.activate();
                vec![Action::OpenSearch]
            }
            KeyCode::Char('y') => state
                .focused_channel()
                .or_else(|| state.nav.selected().cloned())
                .map(|c| vec![Action::CopyToClipboard(c.url)])
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => vec![Action::FocusUp(1)],
            MouseEventKind::ScrollDown => vec![Action::FocusDown(1)],
            MouseEventKind::Down(MouseButton::Left) => {
                // +1 for the top border
                let rel_row = event.row.saturating_sub(area.y + 1) as usize;
                let row = self.list_state.offset() + rel_row;
                let is_double = self
                    .last_click
                    .map_or(false, |(r, t)| r == row && t.elapsed().as_millis() < DOUBLE_CLICK_MS);
                if is_double {
                    self.last_click = None;
                    vec![Action::FocusRow(row), Action::Confirm]
                } else {
                    self.last_click = Some((row, Instant::now()));
                    vec![Action::FocusRow(row)]
                }
            }
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) {
        if let Action::CloseSearch = action {
            self.search.deactivate();
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let view = state.view();
        let count = format!("{}/{}", view.len(), state.catalog.len());
        let block = pane_chrome(
            "channels",
            Some(state.filter.category.label().to_string()),
            focused,
            Some(crate::widgets::pane_chrome::Badge {
                text: &count,
                color: C_MUTED,
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let show_search = self.search.is_active() || !state.filter.query.is_empty();
        let list_area = Rect {
            height: inner.height.saturating_sub(show_search as u16),
            ..inner
        };

        if view.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    Self::empty_message(state),
                    Style::default().fg(C_MUTED),
                )),
                list_area,
            );
        } else {
            let longest_group = view.iter().map(|c| c.group.width()).max().unwrap_or(0);
            let name_width = (inner.width as usize)
                .saturating_sub(3 + 2 + longest_group)
                .max(8);
            let items: Vec<ListItem> = view
                .iter()
                .map(|c| self.render_item(c, state, name_width))
                .collect();
            let list = List::new(items)
                .highlight_style(Style::default().bg(C_SELECTION_BG))
                .highlight_symbol("");
            self.list_state.select(state.nav.focus());
            frame.render_stateful_widget(list, list_area, &mut self.list_state);
        }

        if show_search {
            let search_area = Rect {
                y: inner.y + inner.height.saturating_sub(1),
                height: 1,
                ..inner
            };
            self.search.draw(frame, search_area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate("BBC News", 20), "BBC News");
        assert_eq!(truncate("BBC News", 5), "BBC …");
        assert_eq!(truncate("日本テレビ", 5), "日本…");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn navigation_keys_map_to_focus_actions() {
        let mut list = ChannelList::new();
        let state = AppState::new(1.0);
        assert_eq!(list.handle_key(key(KeyCode::Down), &state), vec![Action::FocusDown(1)]);
        assert_eq!(
            list.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT), &state),
            vec![Action::FocusUp(5)]
        );
        assert_eq!(list.handle_key(key(KeyCode::Enter), &state), vec![Action::Confirm]);
        assert_eq!(list.handle_key(key(KeyCode::Tab), &state), vec![Action::CycleCategory]);
    }

    #[test]
    fn search_mode_routes_text_to_query() {
        let mut list = ChannelList::new();
        let state = AppState::new(1.0);
        assert_eq!(list.handle_key(key(KeyCode::Char('/')), &state), vec![Action::OpenSearch]);
        assert_eq!(
            list.handle_key(key(KeyCode::Char('j')), &state),
            vec![Action::QueryChanged("j".into())]
        );
        assert_eq!(
            list.handle_key(key(KeyCode::Esc), &state),
            vec![Action::QueryChanged(String::new())]
        );
        assert_eq!(
            list.handle_key(key(KeyCode::Esc), &state),
            vec![Action::QueryChanged(String::new()), Action::CloseSearch]
        );
        assert!(!list.search.is_active());
    }

    #[test]
    fn copy_prefers_focused_channel() {
        let mut list = ChannelList::new();
        let mut state = AppState::new(1.0);
        assert!(list.handle_key(key(KeyCode::Char('y')), &state).is_empty());
        state.catalog.set_channels(vec![Channel {
            id: 0,
            name: "A".into(),
            group: "G".into(),
            url: "http://a/x.m3u8".into(),
            logo: String::new(),
        }]);
        state.nav.focus_first(1);
        assert_eq!(
            list.handle_key(key(KeyCode::Char('y')), &state),
            vec![Action::CopyToClipboard("http://a/x.m3u8".into())]
        );
    }
}
