//! Action enum — all user-initiated intents and internal events.

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Selection ────────────────────────────────────────────────────────────
    Next,
    Prev,
    /// Select the channel under the focus cursor.
    Confirm,
    /// Select a channel by catalog id (remote control).
    SelectId(usize),
    Stop,
    Retry,
    Volume(f32),

    // ── Focus cursor ─────────────────────────────────────────────────────────
    FocusUp(usize),
    FocusDown(usize),
    FocusFirst,
    FocusLast,
    /// Put the cursor on a row of the current view.
    FocusRow(usize),
    JumpToCurrent,

    // ── Search / category ────────────────────────────────────────────────────
    OpenSearch,
    CloseSearch,
    QueryChanged(String),
    CycleCategory,
    CycleCategoryBack,

    // ── View ─────────────────────────────────────────────────────────────────
    TogglePanel,
    ToggleFullscreen,
    ToggleHelp,
    CopyToClipboard(String),

    // ── System ───────────────────────────────────────────────────────────────
    Reload,
    Quit,
}
