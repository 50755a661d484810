//! Submission side of the hub.
//!
//! A `HubHandle` is the only way other tasks reach the hub. Every method
//! pushes onto one of the four bounded inbound channels and waits for room
//! when the channel is full; that wait is the broker's backpressure.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::client::{Client, ClientKey};
use crate::hub::message::{PublishMessage, Subscription};
use crate::utils::{Error, Result};

#[derive(Debug, Clone)]
pub struct HubHandle {
    pub(crate) register_tx: mpsc::Sender<Client>,
    pub(crate) unregister_tx: mpsc::Sender<ClientKey>,
    pub(crate) subscribe_tx: mpsc::Sender<Subscription>,
    pub(crate) emit_tx: mpsc::Sender<PublishMessage>,
    pub(crate) shutdown_tx: Arc<watch::Sender<bool>>,
}

impl HubHandle {
    pub async fn register(&self, client: Client) -> Result<()> {
        self.register_tx
            .send(client)
            .await
            .map_err(|_| Error::HubClosed)
    }

    pub async fn unregister(&self, client: ClientKey) -> Result<()> {
        self.unregister_tx
            .send(client)
            .await
            .map_err(|_| Error::HubClosed)
    }

    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        self.subscribe_tx
            .send(subscription)
            .await
            .map_err(|_| Error::HubClosed)
    }

    /// Queue a message for fan-out. Safe to call from any task.
    pub async fn publish(&self, message: PublishMessage) -> Result<()> {
        self.emit_tx
            .send(message)
            .await
            .map_err(|_| Error::HubClosed)
    }

    /// Like [`publish`](Self::publish) but fails with [`Error::HubFull`]
    /// instead of waiting when the publish channel has no room.
    pub fn try_publish(&self, message: PublishMessage) -> Result<()> {
        self.emit_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::HubFull,
            TrySendError::Closed(_) => Error::HubClosed,
        })
    }

    /// Ask the event loop to stop. Every client still registered is closed
    /// on the way out.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called on any
    /// clone of this handle.
    pub async fn stopped(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        // the sender lives in `self`, so this cannot observe a closed channel
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    pub fn is_closed(&self) -> bool {
        self.emit_tx.is_closed()
    }
}
