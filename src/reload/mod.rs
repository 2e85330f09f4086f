//! Hot update notifications.
//!
//! # Modules
//!
//! - `message` - payloads of the notification channel and the client hash report
//! - `server` - standalone WebSocket channel for `toad watch`

pub mod message;
pub mod server;
