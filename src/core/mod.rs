//! Foreground event loop, input handling and shared UI state

pub mod app;
pub mod events;
pub mod state;
