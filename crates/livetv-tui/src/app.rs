//! App — component-based event loop.
//!
//! Architecture:
//! - `App` owns the components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws each frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands to the player core flow out through `event_tx`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use livetv_proto::catalog::CategoryFilter;
use livetv_proto::loader::PlaylistLoader;
use livetv_proto::protocol::{Channel, Command, MpvHealth, PlayerState};

use crate::{
    action::Action,
    app_state::{AppState, LoadPhase},
    component::Component,
    components::{channel_list::ChannelList, header, help_overlay, player_panel::PlayerPanel},
    core::{BroadcastMessage, CoreEvent, CoreFullscreen, StateStore},
    navigation::SelectionChange,
    theme::C_BG,
    widgets::{status_bar::{self, InputMode}, toast::{Severity, ToastManager}},
};

const VOLUME_STEP: f32 = 0.05;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(PlayerState),
    /// Result of the playlist load started as `generation`.
    Loaded {
        generation: u64,
        channels: Vec<Channel>,
    },
    Remote(Action),
}

pub struct App {
    pub state: AppState,

    // ── Components ────────────────────────────────────────────────────────────
    channel_list: ChannelList,
    player_panel: PlayerPanel,

    // ── Plumbing ──────────────────────────────────────────────────────────────
    event_tx: mpsc::Sender<CoreEvent>,
    store: Arc<StateStore>,
    loader: Arc<PlaylistLoader>,
    msg_tx: mpsc::Sender<AppMessage>,
    msg_rx: Option<mpsc::Receiver<AppMessage>>,

    /// Generation of the newest load.  Results of older loads are dropped.
    load_generation: u64,
    load_in_flight: bool,

    /// Last-drawn channel list rect, for mouse hit-testing.
    list_area: Rect,
    toast: ToastManager,
    should_quit: bool,
}

impl App {
    pub fn new(
        loader: PlaylistLoader,
        event_tx: mpsc::Sender<CoreEvent>,
        store: Arc<StateStore>,
        volume: f32,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(1024);
        Self {
            state: AppState::new(volume),
            channel_list: ChannelList::new(),
            player_panel: PlayerPanel,
            event_tx,
            store,
            loader: Arc::new(loader),
            msg_tx,
            msg_rx: Some(msg_rx),
            load_generation: 0,
            load_in_flight: false,
            list_area: Rect::default(),
            toast: ToastManager::default(),
            should_quit: false,
        }
    }

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
        mut remote_rx: mpsc::Receiver<Action>,
    ) -> anyhow::Result<()> {
        let mut rx = self
            .msg_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("App::run called twice"))?;

        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = self.msg_tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (PlayerCore → AppMessage) ─────
        let bc_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated(state)) => {
                        if bc_tx.send(AppMessage::StateUpdated(state)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Background task: remote control (HTTP → AppMessage) ───────────────
        let remote_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            while let Some(action) = remote_rx.recv().await {
                if remote_tx.send(AppMessage::Remote(action)).await.is_err() {
                    break;
                }
            }
        });

        self.start_load();

        // Toast expiry + spinner animation.
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                    while let Ok(next) = rx.try_recv() {
                        needs_redraw |= self.handle_message(next).await;
                    }
                }
                _ = toast_tick.tick() => {
                    if !self.toast.is_empty() {
                        self.toast.tick();
                        needs_redraw = true;
                    }
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        Ok(())
    }

    /// Returns whether a redraw is needed.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    return false;
                }
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                for action in self.handle_mouse(mouse) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
            AppMessage::StateUpdated(player) => {
                self.on_state_updated(player);
                true
            }
            AppMessage::Loaded {
                generation,
                channels,
            } => {
                self.on_loaded(generation, channels).await;
                true
            }
            AppMessage::Remote(action) => {
                debug!("remote action {:?}", action);
                self.dispatch(action).await;
                true
            }
        }
    }

    // ── Playlist loading ──────────────────────────────────────────────────────

    /// Start a load unless one is already running.
    fn start_load(&mut self) {
        if self.load_in_flight {
            self.toast.info("playlist load already in progress");
            return;
        }
        self.load_generation += 1;
        self.load_in_flight = true;
        self.state.load_phase = LoadPhase::Loading;
        self.toast.spinner("loading playlist");

        let generation = self.load_generation;
        let loader = self.loader.clone();
        let tx = self.msg_tx.clone();
        info!("playlist load #{} started", generation);
        tokio::spawn(async move {
            let channels = loader.load().await;
            let _ = tx
                .send(AppMessage::Loaded {
                    generation,
                    channels,
                })
                .await;
        });
    }

    async fn on_loaded(&mut self, generation: u64, channels: Vec<Channel>) {
        if generation != self.load_generation {
            debug!(
                "dropping playlist load #{} (current #{})",
                generation, self.load_generation
            );
            return;
        }
        self.load_in_flight = false;

        let count = channels.len();
        self.state.catalog.set_channels(channels.clone());
        self.state.categories = self.state.catalog.categories();
        if let CategoryFilter::Group(g) = &self.state.filter.category {
            if !self.state.categories.contains(g) {
                self.state.filter.category = CategoryFilter::All;
            }
        }
        self.store.set_channels(channels).await;

        match self.state.nav.on_catalog_replaced(&self.state.catalog) {
            SelectionChange::Unchanged => {}
            SelectionChange::Rebound(ch) => {
                debug!("selection rebound to '{}' (id {})", ch.name, ch.id);
            }
            SelectionChange::Cleared => {
                info!("selected channel is gone after reload, stopping");
                self.toast.warning("selected channel no longer in playlist");
                self.send_cmd(Command::Stop).await;
            }
        }

        let view = self.state.view();
        self.state.nav.clamp_focus(view.len());
        if self.state.nav.focus().is_none() {
            self.state.nav.focus_first(view.len());
        }
        self.state.nav.focus_selected(&view);

        if count == 0 {
            self.state.load_phase = LoadPhase::Empty;
            self.toast
                .resolve_spinner(Severity::Warning, "no channels loaded");
        } else {
            self.state.load_phase = LoadPhase::Loaded;
            self.toast
                .resolve_spinner(Severity::Success, format!("{} channels", count));
        }
    }

    // ── Player state ──────────────────────────────────────────────────────────

    fn on_state_updated(&mut self, new: PlayerState) {
        let old = &self.state.player;
        if new.rev < old.rev {
            return;
        }
        if let Some(err) = new.error.as_ref() {
            if old.error.as_ref() != Some(err) {
                self.toast.error(err.clone());
            }
        }
        if let Some(reason) = new.autoplay_blocked.as_ref() {
            if old.autoplay_blocked.as_ref() != Some(reason) {
                self.toast.warning(reason.clone());
            }
        }
        if new.mpv_health == MpvHealth::Dead && old.mpv_health != MpvHealth::Dead {
            self.toast.error("player window closed");
        }
        self.state.player = new;
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        if self.state.show_help {
            return match key.code {
                KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Esc => {
                    vec![Action::ToggleHelp]
                }
                _ => vec![],
            };
        }

        if self.state.input_mode == InputMode::Search {
            return self.channel_list.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Char('n') => return vec![Action::Next],
            KeyCode::Char('p') => return vec![Action::Prev],
            KeyCode::Char('f') => return vec![Action::ToggleFullscreen],
            KeyCode::Char('r') => return vec![Action::Retry],
            KeyCode::Char('R') => return vec![Action::Reload],
            KeyCode::Char('s') => return vec![Action::Stop],
            KeyCode::Esc => return vec![Action::TogglePanel],
            KeyCode::Char('+') | KeyCode::Char('=') => {
                return vec![Action::Volume(self.state.player.volume + VOLUME_STEP)]
            }
            KeyCode::Char('-') => {
                return vec![Action::Volume(self.state.player.volume - VOLUME_STEP)]
            }
            _ => {}
        }

        if self.state.nav.panel_open() {
            self.channel_list.handle_key(key, &self.state)
        } else {
            vec![]
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        let r = self.list_area;
        let inside = event.column >= r.x
            && event.column < r.x + r.width
            && event.row >= r.y
            && event.row < r.y + r.height;
        if self.state.nav.panel_open() && inside {
            self.channel_list.handle_mouse(event, r, &self.state)
        } else {
            vec![]
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        self.channel_list.on_action(&action, &self.state);
        self.apply_action(action).await;
    }

    async fn apply_action(&mut self, action: Action) {
        let len = self.state.view().len();
        match action {
            Action::Next => {
                let before = self.selected_id();
                let view = self.state.view();
                let picked = self.state.nav.next(&view);
                self.state.nav.focus_selected(&view);
                self.forward_selection(before, picked).await;
            }
            Action::Prev => {
                let before = self.selected_id();
                let view = self.state.view();
                let picked = self.state.nav.prev(&view);
                self.state.nav.focus_selected(&view);
                self.forward_selection(before, picked).await;
            }
            Action::Confirm => {
                let before = self.selected_id();
                let view = self.state.view();
                let picked = self.state.nav.confirm(&view);
                self.forward_selection(before, picked).await;
            }
            Action::SelectId(id) => match self.state.catalog.get(id).cloned() {
                Some(channel) => {
                    let picked = self.state.nav.select(channel);
                    let view = self.state.view();
                    self.state.nav.focus_selected(&view);
                    self.forward_selection(None, picked).await;
                }
                None => warn!("select: no channel with id {}", id),
            },
            Action::Stop => {
                self.state.nav.clear_selection();
                self.send_cmd(Command::Stop).await;
            }
            Action::Retry => self.send_cmd(Command::Retry).await,
            Action::Volume(v) => {
                self.send_cmd(Command::Volume {
                    value: v.clamp(0.0, 1.0),
                })
                .await;
            }

            Action::FocusUp(n) => {
                if self.state.nav.focus().is_none() {
                    self.state.nav.focus_first(len);
                } else {
                    self.state.nav.focus_by(-(n as isize), len);
                }
            }
            Action::FocusDown(n) => {
                if self.state.nav.focus().is_none() {
                    self.state.nav.focus_first(len);
                } else {
                    self.state.nav.focus_by(n as isize, len);
                }
            }
            Action::FocusFirst => self.state.nav.focus_first(len),
            Action::FocusLast => self.state.nav.focus_last(len),
            Action::FocusRow(row) => {
                if row < len {
                    self.state.nav.focus_first(len);
                    self.state.nav.focus_by(row as isize, len);
                }
            }
            Action::JumpToCurrent => {
                let view = self.state.view();
                self.state.nav.focus_selected(&view);
            }

            Action::OpenSearch => self.state.input_mode = InputMode::Search,
            Action::CloseSearch => self.state.input_mode = InputMode::Normal,
            Action::QueryChanged(q) => {
                self.state.filter.query = q;
                self.refocus();
            }
            Action::CycleCategory | Action::CycleCategoryBack => {
                let categories = &self.state.categories;
                self.state.filter.category = if action == Action::CycleCategory {
                    self.state.filter.category.cycle_next(categories)
                } else {
                    self.state.filter.category.cycle_prev(categories)
                };
                self.refocus();
            }

            Action::TogglePanel => {
                let open = self.state.nav.toggle_panel();
                if !open && self.state.input_mode == InputMode::Search {
                    self.state.input_mode = InputMode::Normal;
                    self.channel_list.search.deactivate();
                }
            }
            Action::ToggleFullscreen => {
                let mut control = CoreFullscreen {
                    current: self.state.player.fullscreen,
                    event_tx: &self.event_tx,
                };
                self.state.nav.toggle_fullscreen(&mut control);
            }
            Action::ToggleHelp => self.state.show_help = !self.state.show_help,
            Action::CopyToClipboard(text) => {
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone())) {
                    Ok(()) => {
                        let display = if text.chars().count() > 40 {
                            format!("{}…", text.chars().take(40).collect::<String>())
                        } else {
                            text
                        };
                        self.toast.success(format!("copied: {}", display));
                    }
                    Err(e) => {
                        warn!("clipboard error: {}", e);
                        self.toast.error(format!("clipboard error: {}", e));
                    }
                }
            }

            Action::Reload => self.start_load(),
            Action::Quit => self.should_quit = true,
        }
    }

    fn selected_id(&self) -> Option<usize> {
        self.state.nav.selected().map(|c| c.id)
    }

    /// Tell the core about a new selection.  Picking the channel that is
    /// already selected does not re-attach it.
    async fn forward_selection(&mut self, before: Option<usize>, picked: Option<Channel>) {
        let Some(channel) = picked else {
            return;
        };
        if before == Some(channel.id) {
            return;
        }
        self.send_cmd(Command::Select { channel }).await;
    }

    /// Keep the cursor valid after the view changed.
    fn refocus(&mut self) {
        let len = self.state.view().len();
        self.state.nav.clamp_focus(len);
        if self.state.nav.focus().is_none() {
            self.state.nav.focus_first(len);
        }
    }

    async fn send_cmd(&self, cmd: Command) {
        if self
            .event_tx
            .send(CoreEvent::ClientCommand(cmd))
            .await
            .is_err()
        {
            warn!("player core is gone, command dropped");
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        header::draw(frame, outer[0], &self.state);

        if self.state.nav.panel_open() {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(outer[1]);
            self.list_area = body[0];
            self.channel_list.draw(frame, body[0], true, &self.state);
            self.player_panel.draw(frame, body[1], false, &self.state);
        } else {
            self.list_area = Rect::default();
            self.player_panel.draw(frame, outer[1], true, &self.state);
        }

        status_bar::draw_keys_bar(
            frame,
            outer[2],
            self.state.input_mode,
            &self.state.player.mpv_health,
        );

        if self.state.show_help {
            help_overlay::draw(frame, area);
        }
        self.toast.draw(frame, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: usize, group: &str) -> Channel {
        Channel {
            id,
            name: format!("ch{}", id),
            group: group.into(),
            url: format!("http://tv/{}.m3u8", id),
            logo: String::new(),
        }
    }

    fn app() -> (App, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(32);
        let loader = PlaylistLoader::new(Vec::new()).unwrap();
        (
            App::new(loader, tx, Arc::new(StateStore::default()), 0.8),
            rx,
        )
    }

    async fn loaded(app: &mut App, channels: Vec<Channel>) {
        let generation = app.load_generation;
        app.on_loaded(generation, channels).await;
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn selected(rx: &mut mpsc::Receiver<CoreEvent>) -> Option<usize> {
        match rx.try_recv() {
            Ok(CoreEvent::ClientCommand(Command::Select { channel })) => Some(channel.id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn confirm_selects_once() {
        let (mut app, mut rx) = app();
        loaded(&mut app, vec![ch(0, "A"), ch(1, "B")]).await;
        app.dispatch(Action::FocusDown(1)).await;
        app.dispatch(Action::Confirm).await;
        assert_eq!(selected(&mut rx), Some(1));
        app.dispatch(Action::Confirm).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn next_and_prev_wrap_and_move_the_cursor() {
        let (mut app, mut rx) = app();
        loaded(&mut app, vec![ch(0, "A"), ch(1, "A"), ch(2, "A")]).await;
        app.dispatch(Action::Prev).await;
        assert_eq!(selected(&mut rx), Some(2));
        assert_eq!(app.state.nav.focus(), Some(2));
        app.dispatch(Action::Next).await;
        assert_eq!(selected(&mut rx), Some(0));
        assert_eq!(app.state.nav.focus(), Some(0));
    }

    #[tokio::test]
    async fn next_on_empty_view_does_nothing() {
        let (mut app, mut rx) = app();
        app.dispatch(Action::Next).await;
        assert!(rx.try_recv().is_err());
        assert!(app.state.nav.selected().is_none());
    }

    #[tokio::test]
    async fn superseded_load_is_dropped() {
        let (mut app, _rx) = app();
        app.on_loaded(app.load_generation + 1, vec![ch(0, "A")]).await;
        assert!(app.state.catalog.is_empty());
        assert_eq!(app.state.load_phase, LoadPhase::Loading);
    }

    #[tokio::test]
    async fn reload_without_selected_channel_stops() {
        let (mut app, mut rx) = app();
        loaded(&mut app, vec![ch(0, "A"), ch(1, "A")]).await;
        app.dispatch(Action::SelectId(1)).await;
        assert_eq!(selected(&mut rx), Some(1));

        loaded(&mut app, vec![ch(0, "A")]).await;
        assert!(app.state.nav.selected().is_none());
        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::ClientCommand(Command::Stop))
        ));
    }

    #[tokio::test]
    async fn reload_rebinds_without_reattaching() {
        let (mut app, mut rx) = app();
        loaded(&mut app, vec![ch(0, "A"), ch(1, "A")]).await;
        app.dispatch(Action::SelectId(1)).await;
        selected(&mut rx);

        let mut moved = ch(1, "A");
        moved.id = 0;
        loaded(&mut app, vec![moved]).await;
        assert_eq!(app.state.nav.selected().map(|c| c.id), Some(0));
        assert!(rx.try_recv().is_err());
        assert_eq!(app.store.channels().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_load_reports_empty() {
        let (mut app, _rx) = app();
        loaded(&mut app, Vec::new()).await;
        assert_eq!(app.state.load_phase, LoadPhase::Empty);
        assert_eq!(app.state.nav.focus(), None);
    }

    #[tokio::test]
    async fn category_cycle_keeps_focus_in_view() {
        let (mut app, _rx) = app();
        loaded(
            &mut app,
            vec![ch(0, "News"), ch(1, "Sports"), ch(2, "News"), ch(3, "News")],
        )
        .await;
        app.dispatch(Action::FocusLast).await;
        app.dispatch(Action::CycleCategory).await;
        assert_eq!(
            app.state.filter.category,
            CategoryFilter::Group("News".into())
        );
        app.dispatch(Action::CycleCategory).await;
        assert_eq!(app.state.view().len(), 1);
        assert_eq!(app.state.nav.focus(), Some(0));
        app.dispatch(Action::CycleCategoryBack).await;
        assert_eq!(app.state.view().len(), 3);
    }

    #[tokio::test]
    async fn search_filters_by_name() {
        let (mut app, _rx) = app();
        loaded(&mut app, vec![ch(10, "A"), ch(11, "A"), ch(20, "A")]).await;
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Char('/')))))
            .await;
        assert_eq!(app.state.input_mode, InputMode::Search);
        for c in "ch1".chars() {
            app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Char(c)))))
                .await;
        }
        assert_eq!(app.state.filter.query, "ch1");
        assert_eq!(app.state.view().len(), 2);
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Enter))))
            .await;
        assert_eq!(app.state.input_mode, InputMode::Normal);
        assert_eq!(app.state.filter.query, "ch1");
    }

    #[tokio::test]
    async fn fullscreen_requests_the_opposite() {
        let (mut app, mut rx) = app();
        app.state.player.fullscreen = true;
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Char('f')))))
            .await;
        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::ClientCommand(Command::SetFullscreen { on: false }))
        ));
    }

    #[tokio::test]
    async fn esc_toggles_panel_and_hides_list_keys() {
        let (mut app, mut rx) = app();
        loaded(&mut app, vec![ch(0, "A"), ch(1, "A")]).await;
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Esc))))
            .await;
        assert!(!app.state.nav.panel_open());
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Enter))))
            .await;
        assert!(rx.try_recv().is_err());
        // n/p still work with the panel closed
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Char('n')))))
            .await;
        assert_eq!(selected(&mut rx), Some(0));
    }

    #[tokio::test]
    async fn stale_player_state_is_ignored() {
        let (mut app, _rx) = app();
        app.on_state_updated(PlayerState {
            rev: 5,
            volume: 0.3,
            ..PlayerState::default()
        });
        app.on_state_updated(PlayerState {
            rev: 4,
            volume: 0.9,
            ..PlayerState::default()
        });
        assert_eq!(app.state.player.volume, 0.3);
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let (mut app, mut rx) = app();
        app.state.player.volume = 1.0;
        app.handle_message(AppMessage::Event(Event::Key(key(KeyCode::Char('+')))))
            .await;
        match rx.try_recv() {
            Ok(CoreEvent::ClientCommand(Command::Volume { value })) => assert_eq!(value, 1.0),
            _ => panic!("expected a volume command"),
        }
    }
}
