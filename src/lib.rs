//! # fanhub
//!
//! `fanhub` is an in-memory publish/subscribe broker served over WebSockets.
//! Clients connect, subscribe to named topics and receive every payload
//! published to those topics, whether it came from another client or from
//! inside the process.
//!
//! ## Core Modules
//!
//! - `hub`: the coordination engine. One event loop owns the client registry
//!   and topic membership; everything else talks to it over channels.
//! - `client`: the hub's record of a connected peer and the handle the
//!   connection tasks use to reach the hub.
//! - `broker`: composes a hub with origin checks and the transport, and
//!   exposes the connection acceptor and publish API.
//! - `transport`: WebSocket handshake, per-connection reader/writer and
//!   inbound frame decoding.
//! - `notify`: pluggable lifecycle notifications.
//! - `config`: loading server and broker settings.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod hub;
pub mod notify;
pub mod transport;
pub mod utils;

pub use broker::{Broker, BrokerBuilder};
pub use hub::{Hub, HubHandle, PublishMessage, Subscription};
pub use notify::{Event, Notifier};
pub use utils::{Error, Result};
