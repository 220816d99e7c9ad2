use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use batch_live::client::{ChannelEvent, LiveChannelClient, LocalView, ReconnectOptions};
use batch_live::config::Config;
use batch_live::db::MemoryBatchStore;
use batch_live::models::{BatchStatus, NewBatch, ServerMessage};
use batch_live::routes::create_app;
use batch_live::{build_state, AppState};
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const THROTTLE_MS: u64 = 200;

fn row(n: usize) -> NewBatch {
    NewBatch {
        batch_number: format!("BAT-2023-{}", 1000 + n),
        article_number: format!("ART-{}", 500 + n),
        description: "Hydraulslang HS-12".to_string(),
        location: Some(format!("C-{:02}-1", n % 20)),
        total_weight: 100 + n as i64,
    }
}

async fn spawn_server(rows: usize) -> (SocketAddr, AppState) {
    let config = Config {
        broadcast_throttle_ms: THROTTLE_MS,
        ..Config::default()
    };
    let store = Arc::new(MemoryBatchStore::with_rows((1..=rows).map(row).collect()));
    let state = build_state(store, config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn next_message(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame within 5s")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::from_frame(text.as_str()).unwrap();
        }
    }
}

fn snapshot_of(message: ServerMessage) -> Vec<batch_live::models::Batch> {
    match message {
        ServerMessage::BatchUpdate { data, .. } => data,
        other => panic!("expected batch_update, got {:?}", other),
    }
}

#[tokio::test]
async fn new_subscriber_gets_welcome_then_snapshot() {
    let (addr, _state) = spawn_server(8).await;
    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

    assert!(matches!(next_message(&mut socket).await, ServerMessage::Welcome { .. }));
    let batches = snapshot_of(next_message(&mut socket).await);
    assert_eq!(batches.len(), 8);
    assert!(batches.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test]
async fn closed_socket_is_unregistered() {
    let (addr, state) = spawn_server(2).await;
    let (mut first, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let (mut second, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    for socket in [&mut first, &mut second] {
        next_message(socket).await;
        next_message(socket).await;
    }
    assert_eq!(state.coordinator.connection_count().await, 2);

    first.close(None).await.unwrap();
    wait_for_connections(&state, 1).await;

    drop(second);
    wait_for_connections(&state, 0).await;
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while state.coordinator.connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("connection count never reached {}", expected));
}

#[tokio::test]
async fn completed_batch_is_pushed_to_subscribers() {
    let (addr, state) = spawn_server(8).await;
    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    next_message(&mut socket).await;
    next_message(&mut socket).await;

    state.batches.mark_inventoried(7, None).await.unwrap();

    let batches = snapshot_of(next_message(&mut socket).await);
    let batch = batches.iter().find(|b| b.id == 7).unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.inventored_weight, Some(batch.total_weight));
}

#[tokio::test]
async fn bulk_import_produces_one_broadcast() {
    let (addr, state) = spawn_server(8).await;
    let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    next_message(&mut socket).await;
    next_message(&mut socket).await;

    let rows = (101..=150).map(row).collect();
    let summary = state.batches.import(rows, false).await.unwrap();
    assert_eq!(summary.created, 50);

    assert_eq!(snapshot_of(next_message(&mut socket).await).len(), 58);
    let quiet = timeout(Duration::from_millis(THROTTLE_MS * 3), socket.next()).await;
    assert!(quiet.is_err(), "unexpected extra frame");
}

#[tokio::test]
async fn every_subscriber_sees_the_same_snapshot() {
    let (addr, state) = spawn_server(3).await;
    let mut sockets = Vec::new();
    for _ in 0..3 {
        let (mut socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        next_message(&mut socket).await;
        next_message(&mut socket).await;
        sockets.push(socket);
    }

    state.batches.undo_inventory(2).await.unwrap();
    state.batches.mark_partially_inventoried(3, 40, None).await.unwrap();

    for socket in sockets.iter_mut() {
        let batches = snapshot_of(next_message(socket).await);
        let batch = batches.iter().find(|b| b.id == 3).unwrap();
        assert_eq!(batch.status, BatchStatus::PartiallyCompleted);
        assert_eq!(batch.inventored_weight, Some(40));
    }
}

#[tokio::test]
async fn live_channel_client_follows_server() {
    let (addr, state) = spawn_server(4).await;
    let client = LiveChannelClient::websocket(format!("http://{}", addr), ReconnectOptions::default());
    let mut events = client.subscribe();
    client.connect("/ws").unwrap();

    let mut view = LocalView::new();
    let mut mutated = false;
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        match event {
            ChannelEvent::Message(message) => {
                if !view.apply(&message) {
                    continue;
                }
                if !mutated {
                    assert_eq!(view.len(), 4);
                    state.batches.mark_inventoried(1, Some("Z-99-9".to_string())).await.unwrap();
                    mutated = true;
                } else {
                    let batch = view.find(1).unwrap();
                    assert_eq!(batch.status, BatchStatus::Completed);
                    assert_eq!(batch.location.as_deref(), Some("Z-99-9"));
                    break;
                }
            }
            ChannelEvent::Error(e) => panic!("unexpected channel error: {}", e),
            _ => {}
        }
    }

    client.close();
}
