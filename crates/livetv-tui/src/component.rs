//! Component trait — the interface every UI panel implements.
//!
//! - Components own their local widget state and render themselves.
//! - Components receive `AppState` (read-only) for data they don't own.
//! - Components produce `Vec<Action>`; they never mutate shared state.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{layout::Rect, Frame};

use crate::action::Action;
use crate::app_state::AppState;

pub trait Component {
    /// Handle a key event.  Only called when this component has focus.
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action>;

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// React to an action dispatched by the App, focused or not.
    fn on_action(&mut self, _action: &Action, _state: &AppState) {}

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);
}
