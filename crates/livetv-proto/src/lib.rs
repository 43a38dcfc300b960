pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod platform;
pub mod playlist;
pub mod protocol;
