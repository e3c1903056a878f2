//! WebSocket layer: connection handling, frames, client sessions.
//!
//! The WebSocket endpoint at `/ws` lets clients subscribe to channel
//! patterns and receive matching messages in real time.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;
pub mod subscription;
