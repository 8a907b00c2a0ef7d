//! HTTP and WebSocket handlers.

pub mod control;
pub mod monitor;
