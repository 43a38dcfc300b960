//! Navigator: selection, focus cursor and view toggles over the filtered
//! channel view.
//!
//! Selection and focus are independent.  `next`/`prev` move the selection
//! circularly; the focus cursor is clamped and never wraps.  Neither holds an
//! index into the catalog: selection is a `Channel` value matched by id, and
//! focus is an index into whatever view the caller passes in.

use livetv_proto::catalog::Catalog;
use livetv_proto::protocol::Channel;

/// Fullscreen switch of the video surface.
pub trait FullscreenControl {
    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&mut self, on: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    selected: Option<Channel>,
    focus: Option<usize>,
    panel_open: bool,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            selected: None,
            focus: None,
            panel_open: true,
        }
    }
}

impl Navigator {
    pub fn selected(&self) -> Option<&Channel> {
        self.selected.as_ref()
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    /// Position of the selection in `view`, by id.
    pub fn selected_index(&self, view: &[Channel]) -> Option<usize> {
        let sel = self.selected.as_ref()?;
        view.iter().position(|c| c.id == sel.id)
    }

    /// Select an explicit channel.  Returns it when the selection changed.
    pub fn select(&mut self, channel: Channel) -> Option<Channel> {
        if self.selected.as_ref() == Some(&channel) {
            return None;
        }
        self.selected = Some(channel.clone());
        Some(channel)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Step the selection forward through `view`, wrapping.  No-op on an
    /// empty view.  Returns the newly selected channel.
    pub fn next(&mut self, view: &[Channel]) -> Option<Channel> {
        if view.is_empty() {
            return None;
        }
        let n = view.len();
        let idx = match self.selected_index(view) {
            Some(i) => (i + 1) % n,
            None => 0,
        };
        self.selected = Some(view[idx].clone());
        self.selected.clone()
    }

    /// Step the selection backward through `view`, wrapping.  Without a
    /// current position the last channel is selected.
    pub fn prev(&mut self, view: &[Channel]) -> Option<Channel> {
        if view.is_empty() {
            return None;
        }
        let n = view.len();
        let idx = match self.selected_index(view) {
            Some(i) => (i + n - 1) % n,
            None => n - 1,
        };
        self.selected = Some(view[idx].clone());
        self.selected.clone()
    }

    pub fn focus_down(&mut self, len: usize) {
        self.focus = match (self.focus, len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), len) => Some((i + 1).min(len - 1)),
        };
    }

    pub fn focus_up(&mut self, len: usize) {
        self.focus = match (self.focus, len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), len) => Some(i.saturating_sub(1).min(len - 1)),
        };
    }

    pub fn focus_first(&mut self, len: usize) {
        self.focus = (len > 0).then_some(0);
    }

    pub fn focus_last(&mut self, len: usize) {
        self.focus = len.checked_sub(1);
    }

    /// Move the cursor by `delta` rows, clamped.
    pub fn focus_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.focus = None;
            return;
        }
        let cur = self.focus.unwrap_or(0) as isize;
        self.focus = Some((cur + delta).clamp(0, len as isize - 1) as usize);
    }

    /// Put the cursor on the selected channel if it is in `view`.
    pub fn focus_selected(&mut self, view: &[Channel]) {
        if let Some(i) = self.selected_index(view) {
            self.focus = Some(i);
        }
    }

    /// Keep the cursor inside a view that may have shrunk.
    pub fn clamp_focus(&mut self, len: usize) {
        self.focus = match (self.focus, len) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => None,
        };
    }

    /// Select the focused channel.  Nothing happens when the cursor is
    /// unset or past the end of `view`.
    pub fn confirm(&mut self, view: &[Channel]) -> Option<Channel> {
        let channel = view.get(self.focus?)?.clone();
        self.selected = Some(channel.clone());
        Some(channel)
    }

    pub fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    pub fn toggle_fullscreen(&self, control: &mut dyn FullscreenControl) {
        let on = !control.is_fullscreen();
        control.request_fullscreen(on);
    }

    /// After a reload ids are reassigned.  Keep the selection only if the
    /// new catalog holds the same entry, rebound to its new id.
    pub fn on_catalog_replaced(&mut self, catalog: &Catalog) -> SelectionChange {
        let Some(old) = self.selected.take() else {
            return SelectionChange::Unchanged;
        };
        match catalog.find_equivalent(&old) {
            Some(fresh) if fresh.id == old.id => {
                self.selected = Some(fresh.clone());
                SelectionChange::Unchanged
            }
            Some(fresh) => {
                self.selected = Some(fresh.clone());
                SelectionChange::Rebound(fresh.clone())
            }
            None => SelectionChange::Cleared,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Rebound(Channel),
    Cleared,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: usize) -> Channel {
        Channel {
            id,
            name: format!("ch{}", id),
            group: "G".into(),
            url: format!("http://tv/{}", id),
            logo: String::new(),
        }
    }

    fn view3() -> Vec<Channel> {
        vec![ch(10), ch(11), ch(12)]
    }

    #[test]
    fn next_without_selection_picks_first() {
        let mut nav = Navigator::default();
        assert_eq!(nav.next(&view3()).map(|c| c.id), Some(10));
    }

    #[test]
    fn prev_without_selection_picks_last() {
        let mut nav = Navigator::default();
        assert_eq!(nav.prev(&view3()).map(|c| c.id), Some(12));
    }

    #[test]
    fn next_wraps_from_last() {
        let mut nav = Navigator::default();
        nav.select(ch(12));
        assert_eq!(nav.next(&view3()).map(|c| c.id), Some(10));
    }

    #[test]
    fn prev_wraps_from_first() {
        let mut nav = Navigator::default();
        nav.select(ch(10));
        assert_eq!(nav.prev(&view3()).map(|c| c.id), Some(12));
    }

    #[test]
    fn empty_view_is_noop() {
        let mut nav = Navigator::default();
        nav.select(ch(1));
        assert!(nav.next(&[]).is_none());
        assert!(nav.prev(&[]).is_none());
        assert_eq!(nav.selected().map(|c| c.id), Some(1));
    }

    #[test]
    fn filtered_out_selection_counts_as_none() {
        let mut nav = Navigator::default();
        nav.select(ch(99));
        assert_eq!(nav.next(&view3()).map(|c| c.id), Some(10));
        nav.select(ch(99));
        assert_eq!(nav.prev(&view3()).map(|c| c.id), Some(12));
    }

    #[test]
    fn identity_is_by_id() {
        let mut nav = Navigator::default();
        let mut renamed = ch(11);
        renamed.name = "other".into();
        nav.select(renamed);
        assert_eq!(nav.next(&view3()).map(|c| c.id), Some(12));
    }

    #[test]
    fn focus_clamps_and_never_wraps() {
        let mut nav = Navigator::default();
        nav.focus_up(3);
        assert_eq!(nav.focus(), Some(0));
        nav.focus_up(3);
        assert_eq!(nav.focus(), Some(0));
        for _ in 0..5 {
            nav.focus_down(3);
        }
        assert_eq!(nav.focus(), Some(2));
        nav.focus_down(0);
        assert_eq!(nav.focus(), None);
    }

    #[test]
    fn focus_jumps() {
        let mut nav = Navigator::default();
        nav.focus_last(3);
        assert_eq!(nav.focus(), Some(2));
        nav.focus_by(-10, 3);
        assert_eq!(nav.focus(), Some(0));
        nav.focus_by(1, 3);
        assert_eq!(nav.focus(), Some(1));
        nav.focus_first(0);
        assert_eq!(nav.focus(), None);
        nav.clamp_focus(3);
        assert_eq!(nav.focus(), None);
    }

    #[test]
    fn focus_is_independent_of_selection() {
        let mut nav = Navigator::default();
        nav.focus_down(3);
        nav.focus_down(3);
        nav.next(&view3());
        assert_eq!(nav.focus(), Some(1));
        assert_eq!(nav.selected().map(|c| c.id), Some(10));
    }

    #[test]
    fn confirm_selects_focused() {
        let mut nav = Navigator::default();
        assert!(nav.confirm(&view3()).is_none());
        nav.focus_down(3);
        nav.focus_down(3);
        assert_eq!(nav.confirm(&view3()).map(|c| c.id), Some(11));
        assert_eq!(nav.selected().map(|c| c.id), Some(11));
        nav.focus_last(3);
        assert!(nav.confirm(&view3()[..1]).is_none());
    }

    #[test]
    fn clamp_after_view_shrinks() {
        let mut nav = Navigator::default();
        nav.focus_last(10);
        nav.clamp_focus(3);
        assert_eq!(nav.focus(), Some(2));
    }

    #[test]
    fn focus_selected_follows_playing() {
        let mut nav = Navigator::default();
        nav.select(ch(12));
        nav.focus_selected(&view3());
        assert_eq!(nav.focus(), Some(2));
    }

    #[test]
    fn panel_toggle_does_not_touch_selection() {
        let mut nav = Navigator::default();
        nav.select(ch(10));
        assert!(!nav.toggle_panel());
        assert!(nav.toggle_panel());
        assert_eq!(nav.selected().map(|c| c.id), Some(10));
    }

    struct FakeScreen {
        on: bool,
        requests: Vec<bool>,
    }

    impl FullscreenControl for FakeScreen {
        fn is_fullscreen(&self) -> bool {
            self.on
        }
        fn request_fullscreen(&mut self, on: bool) {
            self.requests.push(on);
            self.on = on;
        }
    }

    #[test]
    fn fullscreen_requests_opposite() {
        let nav = Navigator::default();
        let mut screen = FakeScreen {
            on: false,
            requests: vec![],
        };
        nav.toggle_fullscreen(&mut screen);
        nav.toggle_fullscreen(&mut screen);
        assert_eq!(screen.requests, vec![true, false]);
    }

    #[test]
    fn reload_rebinds_equivalent_selection() {
        let mut nav = Navigator::default();
        nav.select(ch(1));
        let mut moved = ch(1);
        moved.id = 5;
        let catalog = Catalog::new(vec![ch(0), moved.clone()]);
        assert_eq!(
            nav.on_catalog_replaced(&catalog),
            SelectionChange::Rebound(moved)
        );
        assert_eq!(nav.selected().map(|c| c.id), Some(5));
    }

    #[test]
    fn reload_clears_missing_selection() {
        let mut nav = Navigator::default();
        nav.select(ch(7));
        let catalog = Catalog::new(vec![ch(0)]);
        assert_eq!(nav.on_catalog_replaced(&catalog), SelectionChange::Cleared);
        assert!(nav.selected().is_none());
        assert_eq!(
            nav.on_catalog_replaced(&catalog),
            SelectionChange::Unchanged
        );
    }
}
