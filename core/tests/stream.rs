//! Single-stream end-to-end scenarios against a mock answer service.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::coordinator_for;
use common::sse_body;
use common::wait_for_terminal;
use duet_core::ChatClient;
use duet_core::CoreConfig;
use duet_core::Coordinator;
use duet_core::QueryStatus;
use duet_core::SubmitMode;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_raw(body, "text/event-stream")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streams_cumulative_text_to_completion() {
    let server = MockServer::start().await;
    // Single mode streams the professional tone.
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .and(body_partial_json(json!({"tone": "professional"})))
        .respond_with(sse_response(sse_body(&[
            r#"{"parts":[{"type":"text","text":"Hel"}]}"#,
            r#"{"parts":[{"type":"text","text":"Hello world"}]}"#,
            "[DONE]",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator
        .submit("What is streaming?", SubmitMode::Single)
        .expect("prompt accepted");

    let (query, seen) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Completed);
    assert_eq!(query.response.as_deref(), Some("Hello world"));
    assert_eq!(query.error, None);
    assert!(!query.is_dual);
    // Exactly one terminal transition was observed.
    assert_eq!(
        seen.iter().filter(|s| s.is_terminal()).count(),
        1,
        "statuses observed: {seen:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lines_after_the_sentinel_never_mutate_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .respond_with(sse_response(sse_body(&[
            r#"{"parts":[{"type":"text","text":"final answer"}]}"#,
            "[DONE]",
            r#"{"parts":[{"type":"text","text":"MUST NOT APPEAR"}]}"#,
        ])))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Completed);
    assert_eq!(query.response.as_deref(), Some("final answer"));

    // Give any stray late publish a chance to land, then re-check.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let query = coordinator.queries()[index].clone();
    assert_eq!(query.response.as_deref(), Some("final answer"));
    assert_eq!(query.status, QueryStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_line_between_valid_lines_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .respond_with(sse_response(sse_body(&[
            r#"{"parts":[{"type":"text","text":"partial"}]}"#,
            "{this is not json",
            r#"{"parts":[{"type":"text","text":"partial, then whole"}]}"#,
            "[DONE]",
        ])))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Completed);
    assert_eq!(query.response.as_deref(), Some("partial, then whole"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_markdown_constructs_are_closed_in_published_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .respond_with(sse_response(sse_body(&[
            r#"{"parts":[{"type":"text","text":"look:\n```rust\nlet x = 1;"}]}"#,
            "[DONE]",
        ])))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(
        query.response.as_deref(),
        Some("look:\n```rust\nlet x = 1;\n```")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_failure_surfaces_as_error_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("kaboom"))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Error);
    let error = query.error.expect("error text set");
    assert!(error.starts_with("Error: "), "got: {error}");
    assert!(error.contains("500"), "got: {error}");
    // No answer text was ever fabricated.
    assert_eq!(query.response, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_stream_times_out_as_error() {
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;

    // wiremock delays only apply before the headers, so speak HTTP by hand:
    // headers plus one chunk, then silence past the idle timeout.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let line = "data: {\"parts\":[{\"type\":\"text\",\"text\":\"stalling\"}]}\n";
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        let chunk = format!("{head}{:x}\r\n{line}\r\n", line.len());
        socket.write_all(chunk.as_bytes()).await.expect("write");
        // Hold the connection open without ever sending another chunk.
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let config = CoreConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_debounce_window(Duration::from_millis(10))
        .with_idle_timeout(Duration::from_millis(250));
    let coordinator = Coordinator::new(ChatClient::new(&config), config);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Error);
    let error = query.error.expect("error text set");
    assert!(error.contains("idle timeout"), "got: {error}");
    // Text published before the stall stays on screen.
    assert_eq!(query.response.as_deref(), Some("stalling"));
    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_is_not_an_error() {
    let server = MockServer::start().await;
    // A response slow enough that the cancel always lands first.
    Mock::given(method("POST"))
        .and(path("/answer/stream"))
        .respond_with(
            sse_response(sse_body(&["[DONE]"])).set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut rx = coordinator.subscribe();
    let index = coordinator.submit("q", SubmitMode::Single).unwrap();
    coordinator.cancel(index);

    let (query, _) = wait_for_terminal(&mut rx, index).await;
    assert_eq!(query.status, QueryStatus::Cancelled);
    assert_eq!(query.error, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blank_prompt_creates_no_query() {
    let server = MockServer::start().await;
    let coordinator = coordinator_for(&server);
    assert_eq!(coordinator.submit("   ", SubmitMode::Single), None);
    assert!(coordinator.queries().is_empty());
}
