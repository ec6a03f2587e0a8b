//! Relay integration tests against an in-process mock upstream

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use relay_core::backend::{
    build_http_client, ChatCompletionsBackend, CompletionBackend, PdfExporter, UpstreamEndpoint,
};
use relay_core::{
    ArtifactId, ArtifactType, RelayConfig, RelayError, RequestTranslator, ResponseId, StreamRelay,
    StreamState, ThreadId, ThreadStore, Turn,
};

#[derive(Clone, Default)]
struct Upstream {
    requests: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

fn sse_chunk(delta: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": delta}}]})
    )
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        upstream
            .auth
            .lock()
            .push(auth.to_str().unwrap_or_default().to_string());
    }
    upstream.requests.lock().push(body.clone());

    if body["stream"] == json!(true) {
        let mut sse = format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]})
        );
        for delta in ["The ", "answer ", "is 4 ", "✓"] {
            sse.push_str(&sse_chunk(delta));
        }
        sse.push_str("data: [DONE]\n\n");
        ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
    } else {
        Json(json!({"choices": [{"message": {"role": "assistant", "content": "<report edited/>"}}]}))
            .into_response()
    }
}

async fn truncated() -> Response {
    let sse = sse_chunk("half an ans");
    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

async fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "").into_response()
}

async fn pdf(Json(body): Json<Value>) -> Response {
    assert_eq!(body, json!({"exportParams": "opaque-blob"}));
    ([(header::CONTENT_TYPE, "application/pdf")], b"%PDF-1.7 fake".to_vec()).into_response()
}

async fn pdf_failure() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}

async fn spawn_upstream(upstream: Upstream) -> String {
    let router = Router::new()
        .route("/ok/chat/completions", post(completions))
        .route("/truncated/chat/completions", post(truncated))
        .route("/down/chat/completions", post(unavailable))
        .route("/pdf", post(pdf))
        .route("/pdf-failure", post(pdf_failure))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(base: &str, path: &str) -> ChatCompletionsBackend {
    let http = build_http_client(std::time::Duration::from_secs(5)).unwrap();
    ChatCompletionsBackend::new(UpstreamEndpoint::new(format!("{base}/{path}"), "sk-test"), http)
}

#[tokio::test]
async fn test_chat_turn_streams_and_records_history() {
    let upstream = Upstream::default();
    let base = spawn_upstream(upstream.clone()).await;
    let config = RelayConfig::default();
    let store = ThreadStore::default();
    let thread_id = ThreadId::new();

    let prompt = Turn::user("What is 2+2?");
    let request = RequestTranslator::new(&config)
        .chat(&prompt, &store.history(&thread_id), &thread_id, &ResponseId::new())
        .unwrap();

    let deltas = backend(&base, "ok").send_streaming(&request).await.unwrap();
    let hook_store = store.clone();
    let hook_thread = thread_id.clone();
    let user_text = prompt.content().to_string();
    let mut relay = StreamRelay::new(deltas, thread_id.as_str())
        .on_closed(move |content| hook_store.record_exchange(&hook_thread, user_text, content));

    let mut body = String::new();
    while let Some(item) = relay.next().await {
        body.push_str(&item.unwrap());
    }

    assert_eq!(body, "The answer is 4 ✓");
    assert_eq!(relay.state(), StreamState::Closed);

    let history = store.history(&thread_id);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "The answer is 4 ✓");

    assert_eq!(*upstream.auth.lock(), vec!["Bearer sk-test".to_string()]);
    let sent = upstream.requests.lock()[0].clone();
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1]["content"], "What is 2+2?");
    assert!(sent["metadata"]["thesys"].is_string());
}

#[tokio::test]
async fn test_stream_without_end_marker_aborts() {
    let base = spawn_upstream(Upstream::default()).await;
    let request = RequestTranslator::new(&RelayConfig::default())
        .artifact_generate("Q4 trends report", ArtifactType::Report, None, &ArtifactId::new())
        .unwrap();

    let deltas = backend(&base, "truncated").send_streaming(&request).await.unwrap();
    let mut relay = StreamRelay::new(deltas, "art");

    assert_eq!(relay.next().await, Some(Ok("half an ans".to_string())));
    assert!(matches!(
        relay.next().await,
        Some(Err(RelayError::UpstreamRequestFailed { status: None, .. }))
    ));
    assert_eq!(relay.next().await, None);
    assert_eq!(relay.state(), StreamState::Aborted);
}

#[tokio::test]
async fn test_non_success_status_is_upstream_failure() {
    let base = spawn_upstream(Upstream::default()).await;
    let request = RequestTranslator::new(&RelayConfig::default())
        .chat(&Turn::user("hi"), &[], &ThreadId::new(), &ResponseId::new())
        .unwrap();

    let err = backend(&base, "down").send_streaming(&request).await.err().unwrap();
    assert_eq!(
        err,
        RelayError::upstream_status(503, "Service Unavailable")
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_upstream_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = RequestTranslator::new(&RelayConfig::default())
        .chat(&Turn::user("hi"), &[], &ThreadId::new(), &ResponseId::new())
        .unwrap();
    let err = backend(&format!("http://{addr}"), "ok")
        .send(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::UpstreamRequestFailed { .. }));
}

#[tokio::test]
async fn test_edit_is_one_shot() {
    let upstream = Upstream::default();
    let base = spawn_upstream(upstream.clone()).await;
    let request = RequestTranslator::new(&RelayConfig::default())
        .artifact_edit(
            "<report/>",
            "Add an executive summary",
            ArtifactType::Report,
            &ArtifactId::from("art-7"),
        )
        .unwrap();

    let response = backend(&base, "ok").send(&request).await.unwrap();

    assert_eq!(response.content, "<report edited/>");
    assert_eq!(upstream.requests.lock()[0]["stream"], json!(false));
}

#[tokio::test]
async fn test_pdf_export_passthrough() {
    let base = spawn_upstream(Upstream::default()).await;
    let http = build_http_client(std::time::Duration::from_secs(5)).unwrap();

    let exporter = PdfExporter::new(UpstreamEndpoint::new(format!("{base}/pdf"), "k"), http.clone());
    let chunks: Vec<_> = exporter.export(&json!("opaque-blob")).await.unwrap().collect().await;
    let bytes: Vec<u8> = chunks.into_iter().flat_map(Result::unwrap).collect();
    assert_eq!(bytes, b"%PDF-1.7 fake".to_vec());

    let failing = PdfExporter::new(UpstreamEndpoint::new(format!("{base}/pdf-failure"), "k"), http);
    let err = failing.export(&json!("opaque-blob")).await.err().unwrap();
    assert_eq!(err.to_string(), "Failed to export PDF: Bad Gateway");
}
