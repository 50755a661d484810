//! Hub engine
//!
//! The hub holds the authoritative state of the broker:
//! - `clients`: every registered client, keyed by [`ClientKey`]
//! - `topics`: topic name to the keys of its current subscribers
//! - `ids`: caller-supplied id to keys, in registration order
//!
//! Concurrency notes:
//! - State is only touched from [`Hub::run`], which drains the register,
//!   unregister, subscribe and publish channels one event at a time. No lock
//!   guards the maps; confinement to the loop does.
//! - A topic entry exists only while it has at least one subscriber, and a
//!   subscriber key is always present in `clients`.
//! - Fan-out uses `try_send`, so one slow consumer never stalls the loop.
//! - The channels are drained in an unspecified order, but a request never
//!   overtakes the requests it depends on. Before a subscription is applied
//!   the pending registrations are; before a publish, the pending
//!   subscriptions; before an unregister, everything else that is pending.
//!   A caller that queues register, subscribe, publish and unregister back
//!   to back therefore sees them applied in that order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::client::{Client, ClientKey};
use crate::hub::handle::HubHandle;
use crate::hub::message::{PublishMessage, Subscription};
use crate::notify::{Event, Notifier};

pub struct Hub {
    pub(crate) clients: HashMap<ClientKey, Client>,
    pub(crate) topics: HashMap<String, HashSet<ClientKey>>,
    pub(crate) ids: HashMap<String, Vec<ClientKey>>,
    notifier: Arc<dyn Notifier>,
    pub(crate) register_rx: mpsc::Receiver<Client>,
    pub(crate) unregister_rx: mpsc::Receiver<ClientKey>,
    pub(crate) subscribe_rx: mpsc::Receiver<Subscription>,
    pub(crate) emit_rx: mpsc::Receiver<PublishMessage>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Hub {
    /// Create a hub whose inbound channels each buffer `capacity` events,
    /// along with the handle used to feed it.
    pub fn new(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, HubHandle) {
        let capacity = capacity.max(1);
        let (register_tx, register_rx) = mpsc::channel(capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
        let (subscribe_tx, subscribe_rx) = mpsc::channel(capacity);
        let (emit_tx, emit_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let hub = Self {
            clients: HashMap::new(),
            topics: HashMap::new(),
            ids: HashMap::new(),
            notifier,
            register_rx,
            unregister_rx,
            subscribe_rx,
            emit_rx,
            shutdown_rx,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            subscribe_tx,
            emit_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (hub, handle)
    }

    /// The event loop. Runs until [`HubHandle::shutdown`] is called or every
    /// handle has been dropped, then closes whatever clients remain.
    pub async fn run(mut self) {
        info!("Hub event loop started");

        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => self.do_register(client),
                Some(key) = self.unregister_rx.recv() => self.apply_unregister(key),
                Some(subscription) = self.subscribe_rx.recv() => self.apply_subscribe(subscription),
                Some(message) = self.emit_rx.recv() => self.apply_emit(message),
                _ = self.shutdown_rx.changed() => break,
                else => break,
            }
        }

        let remaining: Vec<ClientKey> = self.clients.keys().copied().collect();
        for key in remaining {
            self.do_unregister(key);
        }

        info!("Hub event loop stopped");
    }

    fn apply_subscribe(&mut self, subscription: Subscription) {
        self.settle_registrations();
        self.do_subscribe(subscription);
    }

    fn apply_emit(&mut self, message: PublishMessage) {
        self.settle_subscriptions();
        self.do_emit(message);
    }

    fn apply_unregister(&mut self, key: ClientKey) {
        self.settle_registrations();
        self.settle_subscriptions();
        self.settle_emits();
        self.do_unregister(key);
    }

    // Each settle pass is bounded by what was queued when it started, so a
    // busy channel cannot keep the loop from the event it already took.

    fn settle_registrations(&mut self) {
        for _ in 0..self.register_rx.len() {
            match self.register_rx.try_recv() {
                Ok(client) => self.do_register(client),
                Err(_) => break,
            }
        }
    }

    fn settle_subscriptions(&mut self) {
        for _ in 0..self.subscribe_rx.len() {
            match self.subscribe_rx.try_recv() {
                Ok(subscription) => self.apply_subscribe(subscription),
                Err(_) => break,
            }
        }
    }

    fn settle_emits(&mut self) {
        for _ in 0..self.emit_rx.len() {
            match self.emit_rx.try_recv() {
                Ok(message) => self.apply_emit(message),
                Err(_) => break,
            }
        }
    }

    pub(crate) fn do_register(&mut self, client: Client) {
        let key = client.key();
        debug!(client_id = %client.id, ?key, "register");

        if !self.clients.contains_key(&key) {
            self.ids.entry(client.id.clone()).or_default().push(key);
            self.clients.insert(key, client);
        }

        self.notifier.notify(Event::Register);
    }

    pub(crate) fn do_unregister(&mut self, key: ClientKey) {
        if !self.clients.contains_key(&key) {
            return;
        }

        self.delete_topic_client(key);
        self.handle_empty_topics(key);

        if let Some(mut client) = self.clients.remove(&key) {
            if let Some(keys) = self.ids.get_mut(&client.id) {
                keys.retain(|k| *k != key);
                if keys.is_empty() {
                    self.ids.remove(&client.id);
                }
            }
            client.close();
            debug!(client_id = %client.id, ?key, "unregister");
        }

        self.notifier.notify(Event::Unregister);
    }

    pub(crate) fn do_subscribe(&mut self, subscription: Subscription) {
        let Subscription { client: key, topic } = subscription;

        let Some(client) = self.clients.get_mut(&key) else {
            debug!(?key, %topic, "Ignoring subscription from unregistered client");
            return;
        };

        client.topics.insert(topic.clone());
        self.topics.entry(topic).or_default().insert(key);

        self.notifier.notify(Event::Subscribe);
    }

    pub(crate) fn do_emit(&mut self, message: PublishMessage) {
        let Some(subscribers) = self.topics.get(&message.topic) else {
            return;
        };

        for key in subscribers {
            let Some(client) = self.clients.get(key) else {
                continue;
            };
            match client.try_send(message.payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(client_id = %client.id, topic = %message.topic, "Outbound queue full, dropping message");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client_id = %client.id, topic = %message.topic, "Outbound queue closed");
                }
            }
        }

        self.notifier.notify(Event::Publish);
    }

    /// Remove the client from every topic it recorded. Empty topics are left
    /// in place for [`handle_empty_topics`](Self::handle_empty_topics).
    pub(crate) fn delete_topic_client(&mut self, key: ClientKey) {
        let Some(client) = self.clients.get(&key) else {
            return;
        };
        for topic in &client.topics {
            if let Some(subscribers) = self.topics.get_mut(topic) {
                subscribers.remove(&key);
            }
        }
    }

    /// Drop every topic of this client whose subscriber set is now empty.
    pub(crate) fn handle_empty_topics(&mut self, key: ClientKey) {
        let Some(client) = self.clients.get(&key) else {
            return;
        };
        for topic in &client.topics {
            if self.topics.get(topic).is_some_and(|subscribers| subscribers.is_empty()) {
                self.topics.remove(topic);
            }
        }
    }

    /// First registered client presenting `id`.
    pub fn get_client(&self, id: &str) -> Option<&Client> {
        self.ids
            .get(id)
            .and_then(|keys| keys.first())
            .and_then(|key| self.clients.get(key))
    }
}
