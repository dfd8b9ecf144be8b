pub mod config;
pub mod logging;
pub mod platform;
pub mod status;
pub mod tray;
