//! WebSocket link to the session authority.
//!
//! The engine enqueues outbound messages on a [`ChannelTransport`]; a writer
//! task drains that queue onto the socket. A reader task decodes text frames
//! and hands them to the engine's inbound loop in arrival order.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use zonesync_core::transport::{decode_inbound, encode_outbound};
use zonesync_core::{InboundMessage, OutboundMessage};

/// Handles of the two socket tasks.
pub struct WsLink {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl WsLink {
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connects to `url` and starts pumping frames in both directions.
pub async fn connect(
    url: &str,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> Result<WsLink> {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
    log::info!("[WsTransport] Connected to {}", url);
    let (mut sink, mut source) = stream.split();

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = writer_cancel.cancelled() => break,
                message = outbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let text = match encode_outbound(&message) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("[WsTransport] Dropping outbound message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::text(text)).await {
                log::warn!("[WsTransport] Send failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
        log::debug!("[WsTransport] Writer stopped");
    });

    let reader = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = source.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => match decode_inbound(text.as_str()) {
                    Ok(message) => {
                        if inbound.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("[WsTransport] Ignoring frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    log::info!("[WsTransport] Connection closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("[WsTransport] Receive failed: {}", e);
                    break;
                }
            }
        }
        log::debug!("[WsTransport] Reader stopped");
    });

    Ok(WsLink { reader, writer })
}
