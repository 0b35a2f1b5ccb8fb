#![forbid(unsafe_code)]

//! Duet peer - one endpoint of a WebRTC session negotiated through a relay.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use duet_negotiate::connection::channel;
use duet_negotiate::{ConnectionEvent, ConnectionTable, Coordinator, StreamRoster};
use duet_peer::{relay, Args, RelayEvent, WebRtcEngine};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    duet_common::init_tracing_with_default(&format!(
        "{},webrtc=warn,webrtc_ice=warn,tokio_tungstenite=warn",
        args.log_level
    ));

    let peer_id = args.peer_id();
    let role = args.negotiation_role(&peer_id)?;
    let connection_id = args.connection_id();
    info!(peer_id = %peer_id, %role, connection = %connection_id, "starting duet peer");

    let (relay_tx, mut relay_rx) = relay::connect(&args.relay_url).await?;

    let (handle, inbox) = channel(connection_id.clone());
    let engine = Arc::new(WebRtcEngine::new(&args.engine_config(), handle.clone()).await?);
    let roster = Arc::new(StreamRoster::new());
    let coordinator = Coordinator::new(
        connection_id.clone(),
        role,
        engine.clone(),
        relay_tx,
        roster.clone(),
    );
    let task = inbox.spawn(coordinator);

    let mut table = ConnectionTable::new();
    table.register(handle);

    engine.open_data_channel(&args.data_channel).await?;

    loop {
        tokio::select! {
            event = relay_rx.recv() => match event {
                Some(RelayEvent::Open) => info!("relay session open"),
                Some(RelayEvent::Message(text)) => {
                    if let Err(err) =
                        table.dispatch(&connection_id, ConnectionEvent::SignalReceived(text))
                    {
                        warn!(connection = %connection_id, "failed to queue relay message: {}", err);
                        break;
                    }
                }
                Some(RelayEvent::Closed) | None => {
                    info!("relay closed, shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    table.remove(&connection_id);
    if let Err(err) = engine.close().await {
        warn!("failed to close peer connection: {}", err);
    }
    // Engine callbacks hold handle clones, so the inbox never drains on its own.
    task.abort();
    info!(streams = roster.len(), "duet peer stopped");
    Ok(())
}
