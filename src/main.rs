//! CLI for fanhub
//!
//! Subcommands:
//! - `server`: run the WebSocket broker
//! - `client`: connect, subscribe to a topic, publish once and print what
//!   arrives (useful for smoke tests)

use clap::Parser;
use fanhub::broker::BrokerBuilder;
use fanhub::config::load_config;
use fanhub::utils::logging;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fanhub")]
enum Command {
    /// Start the WebSocket broker
    Server,
    /// Run the example client
    Client {
        /// WebSocket endpoint to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,
        /// Topic to subscribe and publish to
        #[arg(long, default_value = "chat")]
        topic: String,
        /// Payload to publish
        #[arg(long, default_value = "Hello from fanhub")]
        payload: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let result = match cmd {
        Command::Server => run_server().await,
        Command::Client {
            url,
            topic,
            payload,
        } => {
            logging::init("info");
            run_client(&url, &topic, &payload).await
        }
    };

    if let Err(e) = result {
        error!("fanhub failed: {e}");
    }
}

async fn run_server() -> fanhub::Result<()> {
    let config = load_config()?;
    logging::init(&config.log.level);

    let broker = BrokerBuilder::from_settings(&config).build();
    let listener = TcpListener::bind(config.addr()).await?;

    tokio::select! {
        res = broker.serve(listener) => {
            error!("WebSocket server exited unexpectedly.");
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            broker.shutdown();
        }
    }

    Ok(())
}

async fn run_client(url: &str, topic: &str, payload: &str) -> fanhub::Result<()> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    let subscribe = json!({ "type": "subscribe", "topic": topic });
    ws_stream
        .send(WsMessage::text(subscribe.to_string()))
        .await?;

    let publish = json!({ "type": "publish", "topic": topic, "payload": payload });
    ws_stream
        .send(WsMessage::text(publish.to_string()))
        .await?;

    while let Some(msg) = ws_stream.next().await {
        match msg? {
            WsMessage::Text(text) => println!("Incoming: {text}"),
            WsMessage::Binary(data) => println!("Incoming: {} bytes", data.len()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
