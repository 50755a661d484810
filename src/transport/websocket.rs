//! WebSocket transport
//!
//! Two halves of a connection's life:
//! - [`handshake`] upgrades the stream after checking the request path and
//!   the `Origin` header, and derives the client id from the request
//! - [`run_session`] moves frames between the socket and the hub: a writer
//!   task drains the client's outbound queue, the reader decodes inbound
//!   frames into subscribe/publish submissions
//!
//! Whichever half finishes first submits the unregister request; the
//! [`ClientHandle`] makes sure only one of them reaches the hub.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::http::header::ORIGIN;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::origin::OriginPolicy;
use crate::client::ClientHandle;
use crate::transport::message::{FrameCodec, Inbound};
use crate::utils::Result;

/// Derives a client id from the upgrade request.
pub type ClientIdFn = dyn Fn(&Request) -> String + Send + Sync;

pub fn default_client_id(_request: &Request) -> String {
    format!("client-{}", uuid::Uuid::new_v4())
}

/// Perform the WebSocket upgrade. Requests for another path are answered
/// with 404 and disallowed origins with 403; neither is upgraded.
pub async fn handshake<S>(
    stream: S,
    origins: &OriginPolicy,
    path: &str,
    client_id: &ClientIdFn,
) -> Result<(WebSocketStream<S>, String)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut id = String::new();

    let callback = |request: &Request, response: Response| {
        if request.uri().path() != path {
            debug!(path = %request.uri().path(), "Rejecting upgrade for unknown path");
            return Err(reject(StatusCode::NOT_FOUND, "not found"));
        }

        let origin = request.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
        if !origins.allows(origin) {
            warn!(origin = ?origin, "Rejecting upgrade from disallowed origin");
            return Err(reject(StatusCode::FORBIDDEN, "origin not allowed"));
        }

        id = client_id(request);
        Ok(response)
    };

    let ws = accept_hdr_async(stream, callback).await?;
    Ok((ws, id))
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Payloads that are valid UTF-8 go out as text frames, anything else as
/// binary.
pub(crate) fn outbound_frame(payload: Bytes) -> WsMessage {
    match std::str::from_utf8(&payload) {
        Ok(text) => WsMessage::text(text.to_owned()),
        Err(_) => WsMessage::binary(payload),
    }
}

/// Drive a registered client's connection until either side ends.
pub async fn run_session<S>(
    ws: WebSocketStream<S>,
    handle: ClientHandle,
    mut outbound: mpsc::Receiver<Bytes>,
    codec: Arc<dyn FrameCodec>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let writer = {
        let handle = handle.clone();
        tokio::spawn(async move {
            while let Some(payload) = outbound.recv().await {
                if let Err(e) = ws_sender.send(outbound_frame(payload)).await {
                    debug!(client_id = %handle.id(), "Failed to send message: {e}");
                    break;
                }
            }

            // queue released by the hub, or the socket failed
            let _ = ws_sender.send(WsMessage::Close(None)).await;
            let _ = handle.unregister().await;
            debug!(client_id = %handle.id(), "Send loop closed");
        })
    };

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(client_id = %handle.id(), "Read error: {e}");
                break;
            }
        };

        let frame: &[u8] = match &msg {
            WsMessage::Text(text) => text.as_str().as_bytes(),
            WsMessage::Binary(data) => &data[..],
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let submitted = match codec.decode(frame) {
            Ok(Inbound::Subscribe { topic }) => {
                debug!(client_id = %handle.id(), %topic, "subscribe");
                handle.subscribe(topic).await
            }
            Ok(Inbound::Publish { topic, payload }) => {
                debug!(client_id = %handle.id(), %topic, "publish");
                handle.publish(topic, payload).await
            }
            Err(e) => {
                warn!(
                    client_id = %handle.id(),
                    "Invalid client message: {e} | {}",
                    String::from_utf8_lossy(frame).chars().take(100).collect::<String>()
                );
                Ok(())
            }
        };

        if submitted.is_err() {
            break;
        }
    }

    let _ = handle.unregister().await;
    let _ = writer.await;
}
