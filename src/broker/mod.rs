//! Broker
//!
//! The broker is what the outside world talks to. It owns one hub, checks
//! each connection against the origin allow-list, turns accepted
//! connections into registered clients and offers an in-process publish API.
//!
//! ```no_run
//! # async fn run() -> fanhub::Result<()> {
//! use fanhub::broker::Broker;
//!
//! let broker = Broker::builder(["*"]).build();
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! broker.serve(listener).await
//! # }
//! ```

pub mod origin;

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::Request;

use crate::client::Client;
use crate::config::Settings;
use crate::hub::{Hub, HubHandle, PublishMessage};
use crate::notify::{LogNotifier, Notifier};
use crate::transport::websocket::{self, ClientIdFn, default_client_id};
use crate::transport::{FrameCodec, JsonCodec};
use crate::utils::Result;

pub use origin::OriginPolicy;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_PATH: &str = "/ws";

struct Inner {
    hub: HubHandle,
    origins: OriginPolicy,
    path: String,
    client_queue_capacity: usize,
    client_id: Arc<ClientIdFn>,
    codec: Arc<dyn FrameCodec>,
}

#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Broker {
    /// Start configuring a broker. `"*"` in `allowed_origins` accepts any
    /// origin.
    pub fn builder<I, S>(allowed_origins: I) -> BrokerBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        BrokerBuilder::new(OriginPolicy::new(allowed_origins))
    }

    pub fn hub(&self) -> &HubHandle {
        &self.inner.hub
    }

    pub fn origins(&self) -> &OriginPolicy {
        &self.inner.origins
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Publish from inside the process, independent of any connection.
    pub async fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        self.inner
            .hub
            .publish(PublishMessage::new(topic, payload))
            .await
    }

    /// Stop the hub. Every connected client is closed.
    pub fn shutdown(&self) {
        info!("Broker shutting down");
        self.inner.hub.shutdown();
    }

    /// Serve one connection: upgrade it, register the client and run its
    /// reader and writer until the connection ends.
    pub async fn accept<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let inner = &self.inner;
        let (ws, id) = websocket::handshake(
            stream,
            &inner.origins,
            &inner.path,
            inner.client_id.as_ref(),
        )
        .await?;

        let (client, outbound) = Client::new(id, inner.client_queue_capacity);
        let handle = client.handle(inner.hub.clone());
        inner.hub.register(client).await?;
        info!(client_id = %handle.id(), "Client connected");

        websocket::run_session(ws, handle.clone(), outbound, inner.codec.clone()).await;

        info!(client_id = %handle.id(), "Client disconnected");
        Ok(())
    }

    /// Accept TCP connections, one task per connection, until the broker is
    /// shut down.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(
            "WebSocket server listening on ws://{}{}",
            listener.local_addr()?,
            self.inner.path
        );

        let stopped = self.inner.hub.stopped();
        tokio::pin!(stopped);

        loop {
            let accepted = tokio::select! {
                _ = &mut stopped => {
                    info!("Hub stopped, no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    continue;
                }
            };

            let broker = self.clone();
            tokio::spawn(async move {
                if let Err(e) = broker.accept(stream).await {
                    debug!(%peer, "Connection ended: {e}");
                }
            });
        }
    }
}

pub struct BrokerBuilder {
    origins: OriginPolicy,
    notifier: Arc<dyn Notifier>,
    client_queue_capacity: usize,
    hub_capacity: usize,
    path: String,
    client_id: Arc<ClientIdFn>,
    codec: Arc<dyn FrameCodec>,
}

impl BrokerBuilder {
    fn new(origins: OriginPolicy) -> Self {
        Self {
            origins,
            notifier: Arc::new(LogNotifier),
            client_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            hub_capacity: DEFAULT_QUEUE_CAPACITY,
            path: DEFAULT_PATH.to_string(),
            client_id: Arc::new(default_client_id),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Builder preloaded from configuration.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(OriginPolicy::new(&settings.broker.allowed_origins))
            .client_queue_capacity(settings.broker.client_queue_capacity)
            .hub_capacity(settings.broker.hub_capacity)
            .path(settings.server.path.clone())
    }

    pub fn notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn client_queue_capacity(mut self, capacity: usize) -> Self {
        self.client_queue_capacity = capacity.max(1);
        self
    }

    pub fn hub_capacity(mut self, capacity: usize) -> Self {
        self.hub_capacity = capacity.max(1);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// How a client id is derived from the upgrade request, e.g. from a
    /// session header set by an authenticating proxy.
    pub fn client_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.client_id = Arc::new(f);
        self
    }

    pub fn codec<C: FrameCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Build the broker without starting its hub. The caller must drive
    /// [`Hub::run`].
    pub fn into_parts(self) -> (Broker, Hub) {
        let (hub, handle) = Hub::new(self.notifier, self.hub_capacity);
        let broker = Broker {
            inner: Arc::new(Inner {
                hub: handle,
                origins: self.origins,
                path: self.path,
                client_queue_capacity: self.client_queue_capacity,
                client_id: self.client_id,
                codec: self.codec,
            }),
        };
        (broker, hub)
    }

    /// Build the broker and spawn its hub on the current tokio runtime.
    pub fn build(self) -> Broker {
        let (broker, hub) = self.into_parts();
        tokio::spawn(hub.run());
        broker
    }
}
