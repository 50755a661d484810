//! The `transport` module carries the hub over WebSockets.
//!
//! It defines how inbound frames are decoded into hub requests and runs the
//! per-connection handshake, reader and writer.

pub mod message;
pub mod websocket;

pub use message::{ClientMessage, FrameCodec, Inbound, JsonCodec};
pub use websocket::{ClientIdFn, default_client_id, handshake, run_session};
