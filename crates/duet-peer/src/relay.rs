//! WebSocket client for the signalling relay.
//!
//! The relay forwards text frames verbatim between the two members of a room,
//! so frames are carried as opaque strings here and decoded by the
//! coordinator.

use duet_common::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, info, warn};

pub const RELAY_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Open,
    Message(String),
    Closed,
}

pub fn validate_relay_url(url: &str) -> Result<()> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(Error::config(format!(
            "relay url must use ws:// or wss://, got {url}"
        )))
    }
}

/// Connect to the relay.
///
/// Returns the outbound frame sender (usable as a signal sink) and the
/// inbound event stream, which starts with [`RelayEvent::Open`] and ends with
/// [`RelayEvent::Closed`].
pub async fn connect(url: &str) -> Result<(mpsc::Sender<String>, mpsc::Receiver<RelayEvent>)> {
    validate_relay_url(url)?;
    let (ws_stream, _) = connect_async(url).await.map_err(Error::relay)?;
    info!(url, "connected to relay");

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(RELAY_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<RelayEvent>(RELAY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(err) = write.send(WsMessage::Text(text)).await {
                warn!("relay write failed: {}", err);
                break;
            }
        }
        let _ = write.close().await;
    });

    tokio::spawn(async move {
        if event_tx.send(RelayEvent::Open).await.is_err() {
            return;
        }
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if event_tx.send(RelayEvent::Message(text)).await.is_err() {
                        return;
                    }
                }
                Ok(WsMessage::Binary(bytes)) => {
                    warn!(bytes = bytes.len(), "ignoring binary relay frame");
                }
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "relay closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("relay read failed: {}", err);
                    break;
                }
            }
        }
        let _ = event_tx.send(RelayEvent::Closed).await;
    });

    Ok((out_tx, event_rx))
}
