//! Transport tests against scripted server pipes

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{PipeLauncher, ServerEnd, event_line, init_logger};
use coordinator_client::transport::TransportSettings;
use coordinator_client::{CoordError, Launcher, Transport};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn settings() -> TransportSettings {
    TransportSettings {
        shutdown_grace: Duration::from_millis(200),
        ..TransportSettings::default()
    }
}

/// Start a transport over fresh pipes and complete the handshake
async fn started() -> (Arc<Transport>, ServerEnd, mpsc::UnboundedReceiver<ServerEnd>) {
    let (launcher, mut ends) = PipeLauncher::new();
    let transport = Arc::new(Transport::new(launcher, settings()));

    let starting = spawn_start(&transport);
    let mut server = ends.recv().await.unwrap();
    server.complete_handshake().await;
    starting.await.unwrap().unwrap();
    (transport, server, ends)
}

fn spawn_start(transport: &Arc<Transport>) -> JoinHandle<coordinator_client::Result<()>> {
    let transport = transport.clone();
    tokio::spawn(async move { transport.start().await })
}

fn spawn_call(transport: &Arc<Transport>, method: &'static str) -> JoinHandle<coordinator_client::Result<serde_json::Value>> {
    let transport = transport.clone();
    tokio::spawn(async move { transport.call(method, json!({})).await })
}

#[tokio::test]
async fn test_call_before_start_fails() {
    init_logger();
    let (launcher, _ends) = PipeLauncher::new();
    let transport = Transport::new(launcher.clone(), settings());

    assert!(matches!(
        transport.call("status", json!({})).await,
        Err(CoordError::TransportNotStarted)
    ));
    assert!(matches!(
        transport.notify("notifications/initialized", json!({})).await,
        Err(CoordError::TransportNotStarted)
    ));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_handshake_announces_client() {
    init_logger();
    let (launcher, mut ends) = PipeLauncher::new();
    let settings = TransportSettings {
        client_info: coordinator_client::protocol::ClientInfo {
            name: "watcher".into(),
            version: "9.9.9".into(),
        },
        ..settings()
    };
    let transport = Arc::new(Transport::new(launcher, settings));
    let starting = spawn_start(&transport);

    let mut server = ends.recv().await.unwrap();
    let init = server.next_message().await;
    assert_eq!(init["method"], "initialize");
    assert_eq!(init["params"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["params"]["clientInfo"]["name"], "watcher");
    assert_eq!(init["params"]["clientInfo"]["version"], "9.9.9");
    assert!(!transport.is_started());

    server
        .send(&json!({"jsonrpc": "2.0", "id": init["id"], "result": {}}))
        .await;
    let initialized = server.next_message().await;
    assert_eq!(initialized["method"], "notifications/initialized");
    assert!(initialized.get("id").is_none());

    starting.await.unwrap().unwrap();
    assert!(transport.is_started());

    // Starting again is a no-op
    transport.start().await.unwrap();
}

#[tokio::test]
async fn test_out_of_order_responses() {
    init_logger();
    let (transport, mut server, _ends) = started().await;

    let first = spawn_call(&transport, "first");
    let first_req = server.next_message().await;
    let second = spawn_call(&transport, "second");
    let second_req = server.next_message().await;
    assert_ne!(first_req["id"], second_req["id"]);

    server
        .send(&json!({"jsonrpc": "2.0", "id": second_req["id"], "result": "two"}))
        .await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": first_req["id"], "result": "one"}))
        .await;

    assert_eq!(second.await.unwrap().unwrap(), json!("two"));
    assert_eq!(first.await.unwrap().unwrap(), json!("one"));
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn test_malformed_line_does_not_stop_reading() {
    init_logger();
    let (transport, mut server, _ends) = started().await;
    let mut errors = transport.take_error_receiver().unwrap();

    let first = spawn_call(&transport, "first");
    let first_req = server.next_message().await;
    let second = spawn_call(&transport, "second");
    let second_req = server.next_message().await;

    server
        .send(&json!({"jsonrpc": "2.0", "id": first_req["id"], "result": 1}))
        .await;
    server.send_raw("{this is not json\n").await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": second_req["id"], "result": 2}))
        .await;

    assert_eq!(first.await.unwrap().unwrap(), json!(1));
    assert_eq!(second.await.unwrap().unwrap(), json!(2));

    let error = errors.recv().await.unwrap();
    assert!(matches!(error, CoordError::Parse { .. }));
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_overlong_line_is_skipped() {
    init_logger();
    let (launcher, mut ends) = PipeLauncher::new();
    let settings = TransportSettings {
        max_line_length: 256,
        ..settings()
    };
    let transport = Arc::new(Transport::new(launcher, settings));
    let starting = spawn_start(&transport);
    let mut server = ends.recv().await.unwrap();
    server.complete_handshake().await;
    starting.await.unwrap().unwrap();
    let mut errors = transport.take_error_receiver().unwrap();

    let call = spawn_call(&transport, "status");
    let req = server.next_message().await;
    server.send_raw(&format!("{}\n", "x".repeat(1024))).await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": req["id"], "result": "ok"}))
        .await;

    assert_eq!(call.await.unwrap().unwrap(), json!("ok"));
    match errors.recv().await.unwrap() {
        CoordError::Parse { message, .. } => assert!(message.contains("256")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_crlf_and_blank_lines_tolerated() {
    init_logger();
    let (transport, mut server, _ends) = started().await;
    let mut errors = transport.take_error_receiver().unwrap();

    let call = spawn_call(&transport, "status");
    let req = server.next_message().await;
    let reply = json!({"jsonrpc": "2.0", "id": req["id"], "result": "crlf"});
    server.send_raw(&format!("\n\r\n{reply}\r\n")).await;

    assert_eq!(call.await.unwrap().unwrap(), json!("crlf"));
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_remote_error_message_verbatim() {
    init_logger();
    let (transport, mut server, _ends) = started().await;

    let call = spawn_call(&transport, "status");
    let req = server.next_message().await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": req["id"], "error": {"code": -32601, "message": "Method not found: status"}}))
        .await;

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_remote());
    assert_eq!(err.to_string(), "Method not found: status");
}

#[tokio::test]
async fn test_notifications_are_routed() {
    init_logger();
    let (transport, mut server, _ends) = started().await;
    let mut notifications = transport.take_notification_receiver().unwrap();
    assert!(transport.take_notification_receiver().is_none());

    server
        .send_raw(&format!(
            "{}\n",
            event_line("lock_released", json!({"file_path": "/x"}))
        ))
        .await;
    // Plain log notification, not an event
    server
        .send(&json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info", "data": "hello"}}))
        .await;
    server
        .send_raw(&format!(
            "{}\n",
            event_line("plan_updated", json!({"agent_name": "A", "goal": "g", "current_task": "t"}))
        ))
        .await;

    let first = notifications.recv().await.unwrap();
    assert_eq!(first.event, "lock_released");
    assert_eq!(first.payload["file_path"], "/x");
    let second = notifications.recv().await.unwrap();
    assert_eq!(second.event, "plan_updated");
}

#[tokio::test]
async fn test_call_tool_unwraps_text() {
    init_logger();
    let (transport, mut server, _ends) = started().await;

    let t = transport.clone();
    let call = tokio::spawn(async move { t.call_tool("status", json!({})).await });
    let req = server.next_message().await;
    assert_eq!(req["method"], "tools/call");
    assert_eq!(req["params"]["name"], "status");
    server
        .send(&json!({"jsonrpc": "2.0", "id": req["id"], "result": {"content": [{"type": "text", "text": "{\"agents\":[]}"}]}}))
        .await;
    assert_eq!(call.await.unwrap().unwrap(), "{\"agents\":[]}");

    let t = transport.clone();
    let call = tokio::spawn(async move { t.call_tool("admin", json!({})).await });
    let req = server.next_message().await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": req["id"], "result": {"content": [{"type": "text", "text": "denied"}], "isError": true}}))
        .await;
    assert!(matches!(call.await.unwrap(), Err(CoordError::Tool(ref m)) if m == "denied"));
}

#[tokio::test]
async fn test_stop_settles_pending_requests() {
    init_logger();
    let (transport, mut server, _ends) = started().await;
    let mut close = transport.take_close_receiver().unwrap();

    let pending = spawn_call(&transport, "status");
    server.next_message().await;
    assert_eq!(transport.pending_count(), 1);

    transport.stop().await;
    assert!(matches!(
        pending.await.unwrap(),
        Err(CoordError::ClientStopped)
    ));
    assert!(close.try_recv().is_ok());
    assert!(server.client_closed().await);

    // Idempotent, and the transport is single-use
    transport.stop().await;
    assert!(matches!(
        transport.call("status", json!({})).await,
        Err(CoordError::ClientStopped)
    ));
    assert!(matches!(transport.start().await, Err(CoordError::ClientStopped)));
}

#[tokio::test]
async fn test_server_exit_fires_close() {
    init_logger();
    let (transport, mut server, _ends) = started().await;
    let close = transport.take_close_receiver().unwrap();

    let pending = spawn_call(&transport, "status");
    server.next_message().await;
    drop(server);

    tokio::time::timeout(Duration::from_secs(2), close)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        pending.await.unwrap(),
        Err(CoordError::ClientStopped)
    ));
    assert!(!transport.is_started());
}

#[tokio::test]
async fn test_handshake_error_fails_start() {
    init_logger();
    let (launcher, mut ends) = PipeLauncher::new();
    let transport = Arc::new(Transport::new(launcher, settings()));
    let starting = spawn_start(&transport);

    let mut server = ends.recv().await.unwrap();
    let init = server.next_message().await;
    server
        .send(&json!({"jsonrpc": "2.0", "id": init["id"], "error": {"code": -32600, "message": "unsupported protocol"}}))
        .await;

    match starting.await.unwrap() {
        Err(CoordError::Handshake(message)) => assert!(message.contains("unsupported protocol")),
        other => panic!("expected handshake error, got {other:?}"),
    }
    assert!(!transport.is_started());
}

#[tokio::test]
async fn test_exit_during_handshake_fails_start() {
    init_logger();
    let (launcher, mut ends) = PipeLauncher::new();
    let transport = Arc::new(Transport::new(launcher, settings()));
    let starting = spawn_start(&transport);

    let mut server = ends.recv().await.unwrap();
    server.next_message().await;
    drop(server);

    assert!(matches!(
        starting.await.unwrap(),
        Err(CoordError::Handshake(_))
    ));
}

struct FailingLauncher;

impl Launcher for FailingLauncher {
    fn launch(&self) -> coordinator_client::Result<coordinator_client::ServerIo> {
        Err(CoordError::server_not_found("no such server"))
    }

    fn describe(&self) -> String {
        "missing".to_string()
    }
}

#[tokio::test]
async fn test_launch_failure_is_handshake_error() {
    init_logger();
    let transport = Transport::new(Arc::new(FailingLauncher), settings());
    match transport.start().await {
        Err(CoordError::Handshake(message)) => assert!(message.contains("no such server")),
        other => panic!("expected handshake error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stderr_is_forwarded() {
    use tokio::io::AsyncWriteExt;

    init_logger();
    let (transport, mut server, _ends) = started().await;
    let mut logs = transport.take_log_receiver().unwrap();

    server.stderr.write_all(b"booting\n\nready\n").await.unwrap();
    server.stderr.flush().await.unwrap();

    assert_eq!(logs.recv().await.unwrap(), "booting");
    assert_eq!(logs.recv().await.unwrap(), "ready");
}
