//! The `hub` module is the broker's coordination engine.
//!
//! [`Hub`] owns the client registry and topic membership and mutates them
//! from a single event loop ([`Hub::run`]). Everything else reaches it
//! through a [`HubHandle`].

pub mod engine;
pub mod handle;
pub mod message;

pub use engine::Hub;
pub use handle::HubHandle;
pub use message::{PublishMessage, Subscription};

#[cfg(test)]
mod tests;
