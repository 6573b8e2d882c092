//! Live provider against an in-process backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;

use tracelens_client::LiveSource;
use tracelens_config::ClientConfig;
use tracelens_core::{Channel, ChannelEvent, ChannelFrame, ClientError, DataMode, DataSource, TraceFilter};

#[derive(Default)]
struct Recorded {
    trace_query: Option<HashMap<String, String>>,
    ack_query: Option<HashMap<String, String>>,
    ack_body: Option<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

struct TestServer {
    addr: SocketAddr,
    recorded: Shared,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn alert_json(id: i64, acknowledged_by: Option<&str>) -> Value {
    json!({
        "id": id,
        "severity": "HIGH",
        "title": "Latency above threshold",
        "metric": 4200.0,
        "threshold": 3000.0,
        "alert_type": "latency",
        "acknowledged": acknowledged_by.is_some(),
        "acknowledged_by": acknowledged_by,
        "created_at": "2024-05-01T10:00:00"
    })
}

async fn summary() -> Json<Value> {
    Json(json!({"total_requests": 120, "avg_latency_ms": 310.5, "success_rate_pct": 97.5}))
}

async fn traces(State(recorded): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    recorded.lock().unwrap().trace_query = Some(query);
    Json(json!([{
        "id": 1, "model": "gpt-4o", "provider": "openai", "latency_ms": 812.4,
        "tokens": 1200, "cost_usd": 0.02, "status": "success",
        "created_at": "2024-05-01T09:59:00"
    }]))
}

async fn spans_tree(Path(session_id): Path<i64>) -> Json<Value> {
    Json(json!([{
        "id": 10, "name": "planner", "span_type": "agent", "status": "running",
        "latency_ms": 0, "created_at": "2024-05-01T10:00:00",
        "children": [{
            "id": 11, "name": "search", "span_type": "tool", "status": "success",
            "latency_ms": 120.0, "created_at": "2024-05-01T10:00:01", "children": []
        }],
        "metadata": {"session": session_id}
    }]))
}

async fn analysis(Path(session_id): Path<i64>) -> Response {
    if session_id == 999 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Session not found"}))).into_response();
    }
    Json(json!({
        "session": {"id": session_id, "status": "failed", "started_at": "2024-05-01T10:00:00"},
        "metrics": {"total_spans": 2, "failed_spans": 1},
        "root_causes": [{"span_id": 11, "span_name": "search", "span_type": "tool", "error": "timeout"}],
        "bottlenecks": [],
        "token_analysis": {"total_tokens": 0},
        "llm_traces": []
    }))
    .into_response()
}

async fn ack(
    State(recorded): State<Shared>,
    Path(alert_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let by = query.get("acknowledged_by").cloned();
    {
        let mut rec = recorded.lock().unwrap();
        rec.ack_query = Some(query);
        rec.ack_body = Some(body);
    }
    Json(alert_json(alert_id, by.as_deref()))
}

async fn alerts_ws(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let new_alert = json!({"type": "new_alert", "data": alert_json(42, None)}).to_string();
        let wrong_channel = json!({"type": "metrics_update", "data": {}}).to_string();
        let _ = socket.send(Message::Text(new_alert.into())).await;
        let _ = socket.send(Message::Text("{not json".into())).await;
        let _ = socket.send(Message::Text(wrong_channel.into())).await;
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn start_test_server() -> TestServer {
    let recorded: Shared = Arc::default();
    let app = Router::new()
        .route("/metrics/summary", get(summary))
        .route("/traces", get(traces))
        .route("/agents/sessions/{id}/spans/tree", get(spans_tree))
        .route("/agents/sessions/{id}/analysis", get(analysis))
        .route("/alerts/{id}/ack", post(ack))
        .route("/alerts/ws", get(alerts_ws))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestServer { addr, recorded, handle }
}

fn source_for(addr: SocketAddr) -> LiveSource {
    LiveSource::new(ClientConfig { api_base: format!("http://{addr}"), ..Default::default() })
}

#[tokio::test]
async fn test_summary_and_traces_decode() {
    let server = start_test_server().await;
    let source = source_for(server.addr);
    assert_eq!(source.mode(), DataMode::Live);

    let summary = source.summary().await.unwrap();
    assert_eq!(summary.total_requests, 120);

    let filter = TraceFilter { model: Some("gpt-4o".into()), ..TraceFilter::limit(50) };
    let traces = source.traces(&filter).await.unwrap();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].latency_ms, 812);

    let query = server.recorded.lock().unwrap().trace_query.clone().unwrap();
    assert_eq!(query.get("limit").map(String::as_str), Some("50"));
    assert_eq!(query.get("model").map(String::as_str), Some("gpt-4o"));
    assert!(!query.contains_key("provider"));
}

#[tokio::test]
async fn test_spans_tree_is_flattened() {
    let server = start_test_server().await;
    let source = source_for(server.addr);

    let spans = source.session_spans_tree(1).await.unwrap();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[1].parent_id, Some(10));
    assert!(spans.iter().all(|s| s.session_id == 1));
}

#[tokio::test]
async fn test_missing_session_maps_to_not_found() {
    let server = start_test_server().await;
    let source = source_for(server.addr);

    let analysis = source.session_analysis(5).await.unwrap();
    assert_eq!(analysis.root_causes[0].error.as_deref(), Some("timeout"));

    let err = source.session_analysis(999).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_ack_sends_actor_in_query_and_body() {
    let server = start_test_server().await;
    let source = source_for(server.addr);

    let alert = source.acknowledge_alert(7, Some("ops@example.com")).await.unwrap();
    assert!(alert.acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("ops@example.com"));

    let rec = server.recorded.lock().unwrap();
    assert_eq!(
        rec.ack_query.as_ref().and_then(|q| q.get("acknowledged_by")).map(String::as_str),
        Some("ops@example.com")
    );
    assert_eq!(rec.ack_body.as_ref().unwrap()["acknowledged_by"], "ops@example.com");
}

#[tokio::test]
async fn test_alert_channel_frames() {
    let server = start_test_server().await;
    let source = source_for(server.addr);

    let stream = source.subscribe(Channel::Alerts).await;
    let frames: Vec<ChannelFrame> = timeout(Duration::from_secs(5), stream.collect())
        .await
        .expect("channel did not close");

    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0], ChannelFrame::Opened);
    match &frames[1] {
        ChannelFrame::Event(ChannelEvent::NewAlert(alert)) => assert_eq!(alert.id, 42),
        other => panic!("unexpected frame {other:?}"),
    }
    assert!(matches!(frames[2], ChannelFrame::Malformed(_)));
    assert!(matches!(frames[3], ChannelFrame::Malformed(_)));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = source_for(addr);
    let err = source.summary().await.unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));

    let mut stream = source.subscribe(Channel::Metrics).await;
    let first = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
    assert!(matches!(first, Some(ChannelFrame::Failed(_))));
    assert!(stream.next().await.is_none());
}
