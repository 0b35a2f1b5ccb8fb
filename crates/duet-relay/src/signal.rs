use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::rooms::RoomTable;

pub const WS_OUTBOX_CAPACITY: usize = 128;
pub const WS_MAX_TEXT_BYTES: usize = 64 * 1024;

pub type RoomMap = Arc<RwLock<RoomTable<Message>>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomMap,
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(RoomTable::new())),
            max_message_bytes,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(WS_MAX_TEXT_BYTES)
    }
}

#[derive(Debug, Serialize)]
pub struct RelayHealth {
    pub rooms: usize,
    pub members: usize,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.rooms.read().await;
    (
        StatusCode::OK,
        Json(RelayHealth {
            rooms: rooms.room_count(),
            members: rooms.member_count(),
        }),
    )
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_bytes)
        .max_frame_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, room, state, addr))
}

async fn handle_socket(mut stream: WebSocket, room: String, state: AppState, addr: SocketAddr) {
    let (tx, mut rx) = mpsc::channel::<Message>(WS_OUTBOX_CAPACITY);
    let joined = state.rooms.write().await.join(&room, tx);
    let member = match joined {
        Ok(member) => member,
        Err(err) => {
            warn!("rejecting {}: {}", addr, err);
            let _ = stream
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: err.to_string().into(),
                })))
                .await;
            return;
        }
    };
    info!(room = %room, %member, "client connected from {}", addr);

    let (mut sender, mut receiver) = stream.split();
    let (disconnect_tx, mut disconnect_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = disconnect_tx.try_send(());
    });

    loop {
        tokio::select! {
            _ = disconnect_rx.recv() => break,
            msg = receiver.next() => {
                let Some(msg) = msg else { break; };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        debug!(room = %room, %member, "websocket read failed: {}", err);
                        break;
                    }
                };

                let text = match msg {
                    Message::Text(text) => text,
                    Message::Binary(data) => {
                        warn!(room = %room, %member, bytes = data.len(), "dropping binary frame");
                        continue;
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                if text.len() > state.max_message_bytes {
                    warn!(room = %room, %member, bytes = text.len(), "message too large, closing");
                    break;
                }

                state.rooms.write().await.forward(&room, member, Message::Text(text));
            }
        }
    }

    state.rooms.write().await.leave(&room, member);
    info!(room = %room, %member, "client disconnected");
}
