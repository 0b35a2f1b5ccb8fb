#![forbid(unsafe_code)]

//! Duet relay: pairs two endpoints in a named room and forwards their
//! signalling text frames to each other without looking inside them.

pub mod rooms;
pub mod signal;

use axum::{routing::get, Router};

pub use rooms::{RoomError, RoomTable, ROOM_CAPACITY};
pub use signal::{AppState, RelayHealth, WS_MAX_TEXT_BYTES};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Duet Relay Online" }))
        .route("/health", get(signal::health))
        .route("/ws/:room", get(signal::ws_handler))
        .with_state(state)
}
