//! Client representation
//!
//! Registry identity is the [`ClientKey`] minted by [`Client::new`], not the
//! caller-supplied `id`: two connections presenting the same id are separate
//! registry entries. Clones of a `Client` share its key and closed flag.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::hub::{HubHandle, PublishMessage, Subscription};
use crate::utils::Result;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(u64);

impl ClientKey {
    fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    /// Identifier supplied by the embedding application (session, user id...).
    pub id: String,
    key: ClientKey,
    sender: Option<mpsc::Sender<Bytes>>,
    pub(crate) topics: HashSet<String>,
    closed: Arc<AtomicBool>,
}

impl Client {
    /// Create a client together with the receiving end of its outbound queue.
    /// The queue holds at most `capacity` payloads (minimum one).
    pub fn new(id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: id.into(),
            key: ClientKey::next(),
            sender: Some(tx),
            topics: HashSet::new(),
            closed: Arc::new(AtomicBool::new(false)),
        };
        (client, rx)
    }

    pub fn key(&self) -> ClientKey {
        self.key
    }

    pub fn topics(&self) -> &HashSet<String> {
        &self.topics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Capability for connection tasks to talk to the hub about this client.
    pub fn handle(&self, hub: HubHandle) -> ClientHandle {
        ClientHandle {
            id: self.id.clone(),
            key: self.key,
            closed: self.closed.clone(),
            unregistered: Arc::new(AtomicBool::new(false)),
            hub,
        }
    }

    pub(crate) fn try_send(&self, payload: Bytes) -> std::result::Result<(), TrySendError<Bytes>> {
        match &self.sender {
            Some(sender) => sender.try_send(payload),
            None => Err(TrySendError::Closed(payload)),
        }
    }

    /// Mark closed and release the outbound queue. Once every copy of the
    /// sender is gone the writer sees the end of its queue.
    pub(crate) fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.sender = None;
    }
}

#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: String,
    key: ClientKey,
    closed: Arc<AtomicBool>,
    unregistered: Arc<AtomicBool>,
    hub: HubHandle,
}

impl ClientHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> ClientKey {
        self.key
    }

    /// True once the hub has unregistered the client.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn subscribe(&self, topic: impl Into<String>) -> Result<()> {
        self.hub.subscribe(Subscription::new(self.key, topic)).await
    }

    pub async fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        self.hub.publish(PublishMessage::new(topic, payload)).await
    }

    /// Submit the unregister request. Only the first call across all clones
    /// of this handle reaches the hub; later calls return `Ok(false)`.
    pub async fn unregister(&self) -> Result<bool> {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.hub.unregister(self.key).await?;
        Ok(true)
    }
}
