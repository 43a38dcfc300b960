pub mod channel_list;
pub mod header;
pub mod help_overlay;
pub mod player_panel;
