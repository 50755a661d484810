//! The `error` module defines the error type shared across `fanhub`.
//!
//! The hub engine itself never fails on fan-out; these errors surface from
//! submission into a stopped hub, the WebSocket transport, frame decoding and
//! configuration loading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("hub channel is full")]
    HubFull,

    #[error("hub event loop has stopped")]
    HubClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
