//! Inbound frame decoding.
//!
//! The hub only understands subscriptions and publishes; how those are
//! spelled on the wire is up to a [`FrameCodec`]. [`JsonCodec`] is the
//! default:
//!
//! ```json
//! {"type": "subscribe", "topic": "news"}
//! {"type": "publish", "topic": "news", "payload": "hello"}
//! ```
//!
//! A string payload is published as its raw UTF-8 bytes; any other JSON value
//! is published in its serialized form.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::Result;

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Subscribe { topic: String },
    Publish { topic: String, payload: Bytes },
}

pub trait FrameCodec: Send + Sync {
    fn decode(&self, frame: &[u8]) -> Result<Inbound>;
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: serde_json::Value,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl FrameCodec for JsonCodec {
    fn decode(&self, frame: &[u8]) -> Result<Inbound> {
        let inbound = match serde_json::from_slice::<ClientMessage>(frame)? {
            ClientMessage::Subscribe { topic } => Inbound::Subscribe { topic },
            ClientMessage::Publish { topic, payload } => {
                let payload = match payload {
                    serde_json::Value::String(text) => Bytes::from(text),
                    other => Bytes::from(serde_json::to_vec(&other)?),
                };
                Inbound::Publish { topic, payload }
            }
        };
        Ok(inbound)
    }
}
