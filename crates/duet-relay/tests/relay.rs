//! End-to-end tests for the relay over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use duet_common::{SessionDescription, SignalMessage};
use duet_relay::{router, AppState};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_relay(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn join(addr: SocketAddr, room: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws/{room}"))
        .await
        .unwrap();
    client
}

async fn wait_for_members(state: &AppState, members: usize) {
    for _ in 0..200 {
        if state.rooms.read().await.member_count() == members {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("relay never reached {members} members");
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

#[tokio::test]
async fn forwards_text_frames_verbatim() {
    let state = AppState::default();
    let addr = start_relay(state.clone()).await;
    let mut alice = join(addr, "session").await;
    let mut bob = join(addr, "session").await;
    wait_for_members(&state, 2).await;

    let offer = SignalMessage::Offer(SessionDescription::offer("v=0\r\n"))
        .encode()
        .unwrap();
    alice.send(Message::Text(offer.clone())).await.unwrap();
    assert_eq!(next_text(&mut bob).await, offer);

    bob.send(Message::Text("not even json".into())).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "not even json");
}

#[tokio::test]
async fn binary_frames_are_dropped() {
    let state = AppState::default();
    let addr = start_relay(state.clone()).await;
    let mut alice = join(addr, "session").await;
    let mut bob = join(addr, "session").await;
    wait_for_members(&state, 2).await;

    alice.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    alice.send(Message::Text("after".into())).await.unwrap();
    assert_eq!(next_text(&mut bob).await, "after");
}

#[tokio::test]
async fn third_member_gets_close_frame() {
    let state = AppState::default();
    let addr = start_relay(state.clone()).await;
    let _alice = join(addr, "session").await;
    let _bob = join(addr, "session").await;
    wait_for_members(&state, 2).await;

    let mut carol = join(addr, "session").await;
    let frame = tokio::time::timeout(Duration::from_secs(5), carol.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(frame, Message::Close(Some(_))));
    assert_eq!(state.rooms.read().await.member_count(), 2);
}

#[tokio::test]
async fn oversized_message_closes_sender() {
    let state = AppState::new(1024);
    let addr = start_relay(state.clone()).await;
    let mut alice = join(addr, "session").await;
    let _bob = join(addr, "session").await;
    wait_for_members(&state, 2).await;

    let _ = alice.send(Message::Text("x".repeat(4096))).await;
    wait_for_members(&state, 1).await;
}

#[tokio::test]
async fn leaving_frees_the_room() {
    let state = AppState::default();
    let addr = start_relay(state.clone()).await;
    let mut alice = join(addr, "session").await;
    wait_for_members(&state, 1).await;

    alice.close(None).await.unwrap();
    wait_for_members(&state, 0).await;
    assert_eq!(state.rooms.read().await.room_count(), 0);
}

#[tokio::test]
async fn frames_sent_before_peer_joins_are_delivered() {
    let state = AppState::default();
    let addr = start_relay(state.clone()).await;
    let mut alice = join(addr, "session").await;
    wait_for_members(&state, 1).await;

    let offer = SignalMessage::Offer(SessionDescription::offer("early"))
        .encode()
        .unwrap();
    alice.send(Message::Text(offer.clone())).await.unwrap();

    let mut bob = join(addr, "session").await;
    assert_eq!(next_text(&mut bob).await, offer);
}
