mod support;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_and_join(name: &str) -> (Socket, Value) {
    let (mut socket, _) = connect_async(support::ws_url())
        .await
        .expect("websocket connect");
    let join = json!({ "type": "Join", "data": { "display_name": name, "class": "warrior" } });
    socket
        .send(Message::text(join.to_string()))
        .await
        .expect("send join");
    let identity = next_json(&mut socket).await;
    assert_eq!(identity["type"], "Identity");
    (socket, identity["data"].clone())
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("message before timeout")
            .expect("stream open")
            .expect("valid frame");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().expect("utf8")).expect("json message");
        }
    }
}

fn input(sequence: u64, move_x: f32) -> Message {
    let command = json!({
        "type": "Input",
        "data": {
            "sequence": sequence,
            "timestamp_ms": sequence * 33,
            "move_x": move_x,
            "move_y": 0.0,
            "aim": 0.0,
            "delta_time_ms": 33,
            "actions": { "attack": false, "roll": false }
        }
    });
    Message::text(command.to_string())
}

#[tokio::test]
async fn when_client_joins_then_identity_and_own_entity_arrive() {
    let (mut socket, identity) = connect_and_join("alpha").await;
    let entity_id = identity["entity_id"].as_u64().expect("entity id");
    assert!(identity["tick_rate_hz"].as_u64().unwrap_or(0) > 0);

    let sync = next_json(&mut socket).await;
    assert_eq!(sync["type"], "Sync");
    let own = sync["data"]["entity_deltas"]
        .as_array()
        .expect("deltas")
        .iter()
        .find(|d| d["entity"]["id"] == entity_id)
        .cloned()
        .expect("own entity in first update");
    assert_eq!(own["full"], true);
    assert!(own["entity"]["components"]["transform"].is_object());
}

#[tokio::test]
async fn when_oversized_input_is_sent_then_it_is_never_acknowledged() {
    let (mut socket, _) = connect_and_join("bravo").await;

    socket.send(input(1, 1.0)).await.expect("send input 1");
    socket.send(input(2, 1.5)).await.expect("send input 2");
    socket.send(input(3, 1.0)).await.expect("send input 3");

    let mut acks = Vec::new();
    for _ in 0..200 {
        let msg = next_json(&mut socket).await;
        if msg["type"] != "Sync" {
            continue;
        }
        let ack = msg["data"]["last_processed_sequence"].as_u64().expect("ack");
        acks.push(ack);
        if ack == 3 {
            break;
        }
    }

    assert_eq!(acks.last(), Some(&3));
    assert!(!acks.contains(&2), "rejected sequence was acknowledged: {acks:?}");
}

#[tokio::test]
async fn when_first_message_is_not_join_then_connection_is_closed() {
    let (mut socket, _) = connect_async(support::ws_url())
        .await
        .expect("websocket connect");
    socket.send(input(1, 1.0)).await.expect("send input");

    let closed = timeout(Duration::from_secs(5), async {
        while let Some(msg) = socket.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .unwrap_or(false);
    assert!(closed);
}
