//! Lifecycle notifications
//!
//! The hub reports every applied state transition through a [`Notifier`].
//! Notifiers run on the hub's event loop, so implementations must return
//! quickly; anything that needs to do real work should hand the event off
//! (see [`ChannelNotifier`]).

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// A state transition applied by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Register,
    Subscribe,
    Publish,
    Unregister,
}

impl Event {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Register => "register",
            Event::Subscribe => "subscribe",
            Event::Publish => "publish",
            Event::Unregister => "unregister",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);
}

impl<F> Notifier for F
where
    F: Fn(Event) + Send + Sync,
{
    fn notify(&self, event: Event) {
        self(event)
    }
}

/// Default notifier: one `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        info!(event = %event, "hub transition");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: Event) {}
}

/// Forwards events into an unbounded channel so the hub never waits on the
/// consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Event>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: Event) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
