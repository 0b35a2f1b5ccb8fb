#![forbid(unsafe_code)]

//! Duet relay - forwards signalling frames between the two members of a room.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use duet_relay::{router, AppState, WS_MAX_TEXT_BYTES};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "duet-relay")]
#[command(about = "Duet relay - pairs two endpoints per room and forwards their signalling")]
struct Args {
    /// HTTP/WebSocket listen address
    #[arg(long, env = "DUET_RELAY_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Largest accepted WebSocket message in bytes
    #[arg(long, default_value_t = WS_MAX_TEXT_BYTES)]
    max_message_bytes: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    duet_common::init_tracing_with_default(&format!("{},hyper=warn,tokio=warn", args.log_level));

    let app = router(AppState::new(args.max_message_bytes));
    let listener = TcpListener::bind(args.listen).await?;
    info!("relay listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await?;

    Ok(())
}
