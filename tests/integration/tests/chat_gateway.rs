//! End-to-end tests driving the gateway over real WebSocket connections.

use base64::Engine;
use chatrelay_gateway::FrameKind;
use chatrelay_integration_tests::{ScriptedProvider, TestServer};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// 1x1 transparent PNG.
const PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[tokio::test]
async fn test_streamed_reply() {
    let server = TestServer::start(ScriptedProvider::replying(&["Hello", " world"]), 2).await;
    let mut client = server.connect().await;

    client.say("hi there").await;
    let frames = client.frames(4).await;

    let got: Vec<(FrameKind, &str)> = frames.iter().map(|f| (f.kind(), f.msg())).collect();
    assert_eq!(
        got,
        vec![
            (FrameKind::Receive, "hi there"),
            (FrameKind::Chat, "# hi there\n\nHello"),
            (FrameKind::Chat, " world"),
            (FrameKind::Chat, "\n\n###### [END] ######"),
        ]
    );
    assert_ne!(frames[0].msg_id(), frames[1].msg_id());
    assert!(frames[1..].iter().all(|f| f.msg_id() == frames[1].msg_id()));
    for frame in &frames {
        assert!(chrono::NaiveDateTime::parse_from_str(frame.create_time(), "%Y-%m-%d %H:%M:%S")
            .is_ok());
    }

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn test_empty_reply_asks_for_retry() {
    let server = TestServer::start(ScriptedProvider::replying(&[]), 2).await;
    let mut client = server.connect().await;

    client.say("hi there").await;
    let frames = client.frames(2).await;
    assert_eq!(frames[0].kind(), FrameKind::Receive);
    assert_eq!(frames[1].kind(), FrameKind::Retry);
    assert_eq!(frames[1].msg(), "[ERROR] NO RESPONSE, PLEASE RETRY");

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn test_requests_inside_interval_are_rejected() {
    let server = TestServer::start(ScriptedProvider::replying(&["ok"]), 2).await;
    let mut client = server.connect().await;

    client.say("first question").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    client.say("second question").await;

    let frames = client.frames(4).await;
    let errors: Vec<_> = frames
        .iter()
        .filter(|f| f.kind() == FrameKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].msg(), "[ERROR] please wait 2 seconds for next query");
    assert_eq!(server.provider.prompts(), vec!["first question"]);

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn test_image_request_is_stored_and_served() {
    let server = TestServer::start(ScriptedProvider::default().with_image(PNG_B64), 0).await;
    let mut client = server.connect().await;

    client.say("/image a red fox").await;
    let frames = client.frames(2).await;
    assert_eq!(frames[0].kind(), FrameKind::Receive);
    assert_eq!(frames[0].msg(), "/image a red fox");
    assert_eq!(frames[1].kind(), FrameKind::Image);
    assert_eq!(server.provider.prompts(), vec!["a red fox"]);

    let url = frames[1].msg();
    let relative = url
        .strip_prefix("api/assets/")
        .expect("image url under the asset route");
    let file = server.assets.path().join(relative);
    assert!(file.exists(), "{} should exist", file.display());

    let served = reqwest::get(server.url(url)).await.unwrap();
    assert_eq!(served.status(), 200);
    let expected = base64::engine::general_purpose::STANDARD
        .decode(PNG_B64)
        .unwrap();
    assert_eq!(served.bytes().await.unwrap().to_vec(), expected);

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn test_binary_frame_closes_connection() {
    let server = TestServer::start(ScriptedProvider::default(), 0).await;
    let mut client = server.connect().await;

    client.send(WsMessage::Binary(vec![0xde, 0xad])).await;
    let frame = client.frame().await;
    assert_eq!(frame.kind(), FrameKind::Error);
    assert_eq!(frame.msg(), "[ERROR] websocket receive message type not text");
    assert!(client.closed().await);

    server.stop().await;
}

#[tokio::test]
async fn test_health_counts_sessions() {
    let server = TestServer::start(ScriptedProvider::default(), 0).await;

    let health: serde_json::Value = reqwest::get(server.url("api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 0);

    let mut client = server.connect().await;
    // A round trip guarantees the session is registered.
    client.say("ping?").await;
    client.frame().await;

    let health: serde_json::Value = reqwest::get(server.url("api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 1);

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn test_plain_http_on_upgrade_route_is_forbidden() {
    let server = TestServer::start(ScriptedProvider::default(), 0).await;

    let response = reqwest::get(server.url("api/ws/chat")).await.unwrap();
    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");

    server.stop().await;
}
