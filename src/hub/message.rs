//! Values carried on the hub's inbound channels.
//!
//! Both are consumed by a single event-loop iteration and never stored.

use bytes::Bytes;

use crate::client::ClientKey;

/// "This client wants this topic."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub client: ClientKey,
    pub topic: String,
}

impl Subscription {
    pub fn new(client: ClientKey, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }
}

/// "This topic received this payload."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl PublishMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
