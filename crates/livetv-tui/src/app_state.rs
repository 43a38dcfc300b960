//! AppState — shared read-only data passed to all components during render/event.
//!
//! Components read this but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use livetv_proto::catalog::{Catalog, Filter};
use livetv_proto::protocol::{Channel, PlaybackStatus, PlayerState};

use crate::navigation::Navigator;
use crate::widgets::status_bar::InputMode;

/// Progress of the playlist load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Loading,
    Loaded,
    /// Every source failed or yielded nothing.
    Empty,
}

pub struct AppState {
    // ── Player core ─────────────────────────────────────────────────────────
    pub player: PlayerState,

    // ── Channels ────────────────────────────────────────────────────────────
    pub catalog: Catalog,
    pub filter: Filter,
    /// Categories of the current catalog, sorted.
    pub categories: Vec<String>,
    pub load_phase: LoadPhase,

    // ── Navigation ──────────────────────────────────────────────────────────
    pub nav: Navigator,

    // ── UI mode ─────────────────────────────────────────────────────────────
    pub input_mode: InputMode,
    pub show_help: bool,
}

impl AppState {
    pub fn new(volume: f32) -> Self {
        Self {
            player: PlayerState {
                volume,
                ..PlayerState::default()
            },
            catalog: Catalog::default(),
            filter: Filter::default(),
            categories: Vec::new(),
            load_phase: LoadPhase::default(),
            nav: Navigator::default(),
            input_mode: InputMode::Normal,
            show_help: false,
        }
    }

    /// Filtered view of the catalog.  Computed on demand, never cached.
    pub fn view(&self) -> Vec<Channel> {
        self.catalog.view(&self.filter)
    }

    /// Channel under the focus cursor.
    pub fn focused_channel(&self) -> Option<Channel> {
        let idx = self.nav.focus()?;
        self.view().into_iter().nth(idx)
    }

    /// Status of `channel` as far as the player is concerned.  After a
    /// reload the attachment still carries the old id, so an equivalent
    /// entry counts too.
    pub fn status_of(&self, channel: &Channel) -> Option<&PlaybackStatus> {
        let current = self.player.channel.as_ref()?;
        (current.id == channel.id || current.is_equivalent(channel)).then_some(&self.player.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetv_proto::catalog::CategoryFilter;

    fn ch(id: usize, group: &str) -> Channel {
        Channel {
            id,
            name: format!("ch{}", id),
            group: group.into(),
            url: format!("http://tv/{}", id),
            logo: String::new(),
        }
    }

    #[test]
    fn view_follows_filter() {
        let mut state = AppState::new(1.0);
        state
            .catalog
            .set_channels(vec![ch(0, "News"), ch(1, "Sports"), ch(2, "News")]);
        state.filter.category = CategoryFilter::Group("News".into());
        let ids: Vec<usize> = state.view().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn focused_channel_reads_the_view() {
        let mut state = AppState::new(1.0);
        state.catalog.set_channels(vec![ch(0, "A"), ch(1, "B")]);
        assert!(state.focused_channel().is_none());
        state.nav.focus_last(2);
        assert_eq!(state.focused_channel().map(|c| c.id), Some(1));
    }

    #[test]
    fn status_only_for_current_channel() {
        let mut state = AppState::new(1.0);
        state.player.channel = Some(ch(4, "A"));
        state.player.status = PlaybackStatus::Playing;
        assert_eq!(state.status_of(&ch(4, "A")), Some(&PlaybackStatus::Playing));
        assert_eq!(state.status_of(&ch(5, "A")), None);
    }
}
