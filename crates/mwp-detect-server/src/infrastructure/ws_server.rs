//! WebSocket server: accept loop and per-connection request handling.
//!
//! Every connection runs in its own Tokio task.  Inside a connection the
//! exchange is strictly request/response: one JSON text frame in, one JSON
//! text frame out, in order.  The engine keeps one connection per control
//! loop, so concurrency comes from connections, not from pipelining.
//!
//! Binary frames get an `Error` response.  Ping/pong is answered by
//! tungstenite itself.  Shutdown is a shared `AtomicBool` cleared by the
//! Ctrl+C handler in `main.rs`; the accept loop re-checks it every
//! `accept_poll`.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use mwp_core::protocol::DetectResponse;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::DetectService;
use crate::domain::ServerConfig;

/// Binds `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: ServerConfig,
    service: DetectService,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind detection listener on {}", config.bind_addr))?;
    info!("detection server listening on {}", config.bind_addr);

    serve(listener, service, config.accept_poll, running).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    service: DetectService,
    accept_poll: Duration,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(accept_poll, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let service = service.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, service).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {} // poll timeout; re-check the flag
        }
    }
    Ok(())
}

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, service: DetectService) {
    let session = Uuid::new_v4();
    info!(%session, "engine connected from {peer_addr}");
    match run_session(stream, session, service).await {
        Ok(served) => info!(%session, served, "connection closed"),
        Err(e) => warn!(%session, "connection closed with error: {e:#}"),
    }
}

/// Serves one connection; returns how many requests were answered.
async fn run_session(stream: TcpStream, session: Uuid, service: DetectService) -> anyhow::Result<u64> {
    let mut ws = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed for session {session}"))?;

    let mut served = 0u64;
    while let Some(frame) = ws.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => break,
            Err(e) => return Err(e).context("WebSocket read failed"),
        };

        let response = match frame {
            WsMessage::Text(text) => service.handle_text(&text).await,
            WsMessage::Binary(_) => DetectResponse::Error {
                request_id: None,
                message: "binary frames are not supported; send JSON text".to_string(),
            },
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let json = serde_json::to_string(&response).context("failed to serialize response")?;
        ws.send(WsMessage::Text(json)).await.context("WebSocket send failed")?;
        served += 1;
        debug!(%session, served, "response sent");
    }
    Ok(served)
}
