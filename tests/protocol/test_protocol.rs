//! Tests for JSON-RPC framing, request correlation and typed payloads

use coordinator_client::operations::{
    AdminAction, LockAction, MessageAction, PlanAction, RemoteOperation, SubscribeAction,
};
use coordinator_client::protocol::{
    ClientInfo, InitializeParams, ProtocolHandler, Routed, ToolCallResult,
};
use coordinator_client::{CoordError, CoordinatorEvent, NotificationEvent, SubscriberId};
use serde_json::json;

#[test]
fn test_request_ids_are_monotonic() {
    let handler = ProtocolHandler::new();
    let (id1, _rx1) = handler.register().unwrap();
    let (id2, _rx2) = handler.register().unwrap();
    let id3 = handler.next_id();
    assert!(id1 < id2);
    assert!(id2 < id3);
    assert_eq!(handler.pending_count(), 2);
}

#[test]
fn test_encode_request_is_one_line() {
    let handler = ProtocolHandler::new();
    let (id, _rx) = handler.register().unwrap();
    let frame = handler
        .encode_request(id, "tools/call", json!({"name": "status", "arguments": {}}))
        .unwrap();
    assert!(frame.ends_with('\n'));
    assert_eq!(frame.matches('\n').count(), 1);

    let parsed: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
    assert_eq!(parsed["jsonrpc"], "2.0");
    assert_eq!(parsed["id"], id.get());
    assert_eq!(parsed["method"], "tools/call");
}

#[test]
fn test_encode_notification_has_no_id() {
    let handler = ProtocolHandler::new();
    let frame = handler
        .encode_notification("notifications/initialized", json!({}))
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
    assert!(parsed.get("id").is_none());
    assert_eq!(parsed["method"], "notifications/initialized");
}

#[tokio::test]
async fn test_route_settles_out_of_order_responses() {
    let handler = ProtocolHandler::new();
    let (id1, rx1) = handler.register().unwrap();
    let (id2, rx2) = handler.register().unwrap();

    assert_eq!(
        handler.route(json!({"jsonrpc": "2.0", "id": id2.get(), "result": "second"})),
        Routed::Settled(id2)
    );
    assert_eq!(
        handler.route(json!({"jsonrpc": "2.0", "id": id1.get(), "result": "first"})),
        Routed::Settled(id1)
    );

    assert_eq!(rx1.await.unwrap().unwrap(), json!("first"));
    assert_eq!(rx2.await.unwrap().unwrap(), json!("second"));
    assert_eq!(handler.pending_count(), 0);
}

#[tokio::test]
async fn test_route_error_passes_message_verbatim() {
    let handler = ProtocolHandler::new();
    let (id, rx) = handler.register().unwrap();
    handler.route(json!({"jsonrpc": "2.0", "id": id.get(), "error": {"code": -32000, "message": "Lock held by B"}}));

    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, CoordError::Remote(_)));
    assert_eq!(err.to_string(), "Lock held by B");
}

#[tokio::test]
async fn test_route_missing_result_is_null() {
    let handler = ProtocolHandler::new();
    let (id, rx) = handler.register().unwrap();
    handler.route(json!({"jsonrpc": "2.0", "id": id.get()}));
    assert_eq!(rx.await.unwrap().unwrap(), serde_json::Value::Null);
}

#[test]
fn test_route_unknown_id_is_ignored() {
    let handler = ProtocolHandler::new();
    let (_id, _rx) = handler.register().unwrap();
    assert_eq!(
        handler.route(json!({"jsonrpc": "2.0", "id": 999, "result": {}})),
        Routed::Ignored
    );
    assert_eq!(handler.pending_count(), 1);
}

#[test]
fn test_route_event_notification() {
    let handler = ProtocolHandler::new();
    let routed = handler.route(json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": {"level": "info", "data": {
            "event": "lock_released",
            "payload": {"file_path": "/x"},
            "timestamp": 42
        }}
    }));
    match routed {
        Routed::Notification(event) => {
            assert_eq!(event.event, "lock_released");
            assert_eq!(event.timestamp, 42);
            assert_eq!(event.payload["file_path"], "/x");
        }
        other => panic!("expected notification, got {other:?}"),
    }
}

#[test]
fn test_route_event_with_fractional_or_missing_timestamp() {
    let handler = ProtocolHandler::new();
    let route_at = |timestamp: serde_json::Value| {
        handler.route(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"data": {
                "event": "lock_released",
                "payload": {"file_path": "/x"},
                "timestamp": timestamp
            }}
        }))
    };

    match route_at(json!(1_700_000_000_123.75)) {
        Routed::Notification(event) => assert_eq!(event.timestamp, 1_700_000_000_123),
        other => panic!("expected notification, got {other:?}"),
    }
    match route_at(serde_json::Value::Null) {
        Routed::Notification(event) => assert_eq!(event.timestamp, 0),
        other => panic!("expected notification, got {other:?}"),
    }
}

#[test]
fn test_route_ignores_other_shapes() {
    let handler = ProtocolHandler::new();
    // Log message without an event field
    assert_eq!(
        handler.route(json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"data": "hello"}})),
        Routed::Ignored
    );
    // Some other notification
    assert_eq!(
        handler.route(json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}})),
        Routed::Ignored
    );
    assert_eq!(handler.route(json!([1, 2, 3])), Routed::Ignored);
}

#[tokio::test]
async fn test_fail_all_settles_and_closes() {
    let handler = ProtocolHandler::new();
    let (_id1, rx1) = handler.register().unwrap();
    let (_id2, rx2) = handler.register().unwrap();

    assert_eq!(handler.fail_all(&CoordError::ClientStopped), 2);
    assert!(matches!(rx1.await.unwrap(), Err(CoordError::ClientStopped)));
    assert!(matches!(rx2.await.unwrap(), Err(CoordError::ClientStopped)));
    assert!(handler.is_closed());
    assert!(matches!(handler.register(), Err(CoordError::ClientStopped)));
}

#[test]
fn test_decode_line_reports_parse_error() {
    let handler = ProtocolHandler::new();
    let err = handler.decode_line("{not json").unwrap_err();
    match err {
        CoordError::Parse { line, .. } => assert_eq!(line.as_deref(), Some("{not json")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_parse_error_truncates_long_lines() {
    let long = "é".repeat(1000);
    match CoordError::parse("bad", Some(&long)) {
        CoordError::Parse {
            line: Some(line), ..
        } => {
            assert!(line.len() < long.len());
            assert!(line.ends_with("..."));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_initialize_params_shape() {
    let params = InitializeParams::new(
        "2024-11-05",
        ClientInfo {
            name: "watcher".into(),
            version: "1.2.3".into(),
        },
    );
    assert_eq!(
        serde_json::to_value(&params).unwrap(),
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "watcher", "version": "1.2.3"}
        })
    );
}

#[test]
fn test_tool_result_text_and_errors() {
    let ok: ToolCallResult =
        serde_json::from_value(json!({"content": [{"type": "text", "text": "{\"a\":1}"}]}))
            .unwrap();
    assert_eq!(ok.into_text().unwrap(), "{\"a\":1}");

    let empty: ToolCallResult = serde_json::from_value(json!({"content": []})).unwrap();
    assert_eq!(empty.into_text().unwrap(), "{}");

    let failed: ToolCallResult = serde_json::from_value(
        json!({"content": [{"type": "text", "text": "Agent not found"}], "isError": true}),
    )
    .unwrap();
    let err = failed.into_text().unwrap_err();
    assert!(matches!(err, CoordError::Tool(ref m) if m == "Agent not found"));
    assert!(err.is_remote());

    let bare: ToolCallResult = serde_json::from_value(json!({"isError": true})).unwrap();
    assert!(matches!(bare.into_text(), Err(CoordError::Tool(ref m)) if m == "Unknown error"));
}

#[test]
fn test_operation_arguments() {
    let acquire = RemoteOperation::from(LockAction::Acquire {
        file_path: "/x".into(),
        agent_name: "A".into(),
        agent_key: "k".into(),
        reason: None,
    });
    assert_eq!(acquire.tool_name(), "lock");
    assert_eq!(
        acquire.arguments().unwrap(),
        json!({"action": "acquire", "file_path": "/x", "agent_name": "A", "agent_key": "k"})
    );

    let mark_read = RemoteOperation::from(MessageAction::MarkRead {
        agent_name: "A".into(),
        agent_key: "k".into(),
        message_id: "m1".into(),
    });
    assert_eq!(mark_read.tool_name(), "message");
    assert_eq!(mark_read.arguments().unwrap()["action"], "mark_read");

    let plan = RemoteOperation::from(PlanAction::Update {
        agent_name: "A".into(),
        agent_key: "k".into(),
        goal: "ship".into(),
        current_task: "tests".into(),
    });
    assert_eq!(plan.arguments().unwrap()["action"], "update");

    let delete = RemoteOperation::from(AdminAction::DeleteAgent {
        agent_name: "A".into(),
    });
    assert_eq!(
        delete.arguments().unwrap(),
        json!({"action": "delete_agent", "agent_name": "A"})
    );

    let unsubscribe = RemoteOperation::from(SubscribeAction::Unsubscribe {
        subscriber_id: SubscriberId::new("watcher"),
    });
    assert_eq!(unsubscribe.tool_name(), "subscribe");
    assert_eq!(
        unsubscribe.arguments().unwrap(),
        json!({"action": "unsubscribe", "subscriber_id": "watcher"})
    );

    assert_eq!(
        RemoteOperation::Register { name: "A".into() }
            .arguments()
            .unwrap(),
        json!({"name": "A"})
    );
    assert_eq!(RemoteOperation::Status.arguments().unwrap(), json!({}));
}

fn notification(event: &str, payload: serde_json::Value) -> NotificationEvent {
    NotificationEvent {
        event: event.to_string(),
        payload,
        timestamp: 1_000,
    }
}

#[test]
fn test_event_parsing_fills_timestamps() {
    let event = CoordinatorEvent::from_notification(&notification(
        "lock_acquired",
        json!({"file_path": "/x", "agent_name": "A", "expires_at": 5_000, "reason": "edit"}),
    ))
    .unwrap();
    match event {
        CoordinatorEvent::LockAcquired(lock) => {
            assert_eq!(lock.acquired_at, 1_000);
            assert_eq!(lock.expires_at, 5_000);
            assert_eq!(lock.reason.as_deref(), Some("edit"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let event = CoordinatorEvent::from_notification(&notification(
        "message_sent",
        json!({"message_id": "m1", "from_agent": "A", "to_agent": "*", "content": "hi"}),
    ))
    .unwrap();
    match event {
        CoordinatorEvent::MessageSent(message) => {
            assert_eq!(message.id, "m1");
            assert_eq!(message.created_at, 1_000);
            assert!(message.is_unread());
            assert!(message.is_broadcast());
        }
        other => panic!("unexpected {other:?}"),
    }

    let event = CoordinatorEvent::from_notification(&notification(
        "agent_registered",
        json!({"agent_name": "A"}),
    ))
    .unwrap();
    match event {
        CoordinatorEvent::AgentRegistered(agent) => {
            assert_eq!(agent.registered_at, 1_000);
            assert_eq!(agent.last_active, 1_000);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_event_parsing_unknown_and_malformed() {
    assert_eq!(
        CoordinatorEvent::from_notification(&notification("agent_sneezed", json!({}))).unwrap(),
        CoordinatorEvent::Unknown("agent_sneezed".into())
    );

    let err = CoordinatorEvent::from_notification(&notification(
        "lock_renewed",
        json!({"file_path": "/x"}),
    ))
    .unwrap_err();
    assert!(matches!(err, CoordError::Protocol(_)));
}
