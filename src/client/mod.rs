//! The `client` module defines the hub's view of one connected peer.
//!
//! [`Client`] is the record the hub owns while the peer is registered: its
//! identifier, its outbound queue and the topics it subscribed to.
//! [`ClientHandle`] is what the connection tasks keep: a non-owning capability
//! to submit requests about that client back to the hub.

pub mod pubsub_client;
pub use pubsub_client::{Client, ClientHandle, ClientKey};
