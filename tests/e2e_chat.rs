//! End-to-end chat exchanges against a mock backend.
//!
//! These tests exercise the full HTTP stack: the request body the client
//! posts, the streamed reply it decodes, and the side effects of the
//! directives found in it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use liebe::config::LiebeConfig;
use liebe::directive::DateKey;
use liebe::scheduler::AlarmScheduler;
use liebe::session::Role;
use liebe::store::{MemoryStore, Store};
use liebe::{Assistant, ChatClient, ChatUpdate, ExchangeOutcome, ManualClock};
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 14, 21, 15, 0).single().unwrap()
}

fn frames(events: &[serde_json::Value]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn stream_response(events: &[serde_json::Value]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(frames(events))
}

fn reply(text: &str) -> ResponseTemplate {
    stream_response(&[
        json!({"status": "chunk", "text": text}),
        json!({"status": "done", "full_text": text, "service": "gemini"}),
    ])
}

fn assistant(server: &MockServer, store: Arc<MemoryStore>) -> Assistant {
    let mut config = LiebeConfig::default();
    config.server.base_url = server.uri();
    Assistant::new(
        ChatClient::from_config(&config),
        store,
        Arc::new(Mutex::new(AlarmScheduler::new())),
        Arc::new(ManualClock::new(now())),
    )
}

#[tokio::test]
async fn reply_is_committed_and_directives_executed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "message": "wake me at 7:05 and remind me to buy milk",
            "history": [],
            "search_enabled": false,
            "deep_thinking_enabled": false
        })))
        .respond_with(stream_response(&[
            json!({"status": "progress", "message": "Thinking..."}),
            json!({"status": "chunk", "text": "Alarm set for 7:05. "}),
            json!({"status": "chunk", "text": "[ALARM:7:05][NOTE:Buy milk|today]"}),
            json!({
                "status": "done",
                "full_text": "Alarm set for 7:05. [ALARM:7:05][NOTE:Buy milk|today]",
                "service": "gemini"
            }),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let assistant = assistant(&server, store.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let outcome = assistant
        .chat("wake me at 7:05 and remind me to buy milk", &tx)
        .await;

    let ExchangeOutcome::Completed {
        cleaned_text,
        service,
        requests,
    } = outcome
    else {
        panic!("expected completion");
    };
    assert_eq!(cleaned_text, "Alarm set for 7:05. ");
    assert_eq!(service, "gemini");
    assert_eq!(requests.len(), 2);

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    assert_eq!(updates[0], ChatUpdate::Status("Thinking...".into()));
    assert_eq!(
        updates.last(),
        Some(&ChatUpdate::Partial("Alarm set for 7:05. ".into()))
    );

    let history = assistant.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);

    let scheduler = assistant.scheduler();
    assert_eq!(scheduler.lock().await.alarms()[0].label, "07:05");
    let notes = store.list_notes(Some(DateKey::today(&now()))).await.unwrap();
    assert_eq!(notes[0].content, "Buy milk");
}

#[tokio::test]
async fn follow_up_carries_prior_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"message": "first"})))
        .respond_with(reply("one"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "message": "second",
            "history": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "one"}
            ]
        })))
        .respond_with(reply("two"))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant(&server, Arc::new(MemoryStore::new()));
    let (tx, _rx) = mpsc::unbounded_channel();
    assistant.chat("first", &tx).await;
    let outcome = assistant.chat("second", &tx).await;

    assert!(matches!(outcome, ExchangeOutcome::Completed { .. }));
    assert_eq!(assistant.history().await.len(), 4);
}

#[tokio::test]
async fn backend_http_error_fails_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let assistant = assistant(&server, Arc::new(MemoryStore::new()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let outcome = assistant.chat("hello", &tx).await;

    let ExchangeOutcome::Failed(message) = outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("500"));
    let history = assistant.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn error_frame_fails_exchange_without_commit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(stream_response(&[
            json!({"status": "chunk", "text": "Partial"}),
            json!({"status": "error", "message": "quota exceeded"}),
            json!({"status": "chunk", "text": "ignored"}),
        ]))
        .mount(&server)
        .await;

    let assistant = assistant(&server, Arc::new(MemoryStore::new()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let outcome = assistant.chat("hello", &tx).await;

    assert_eq!(outcome, ExchangeOutcome::Failed("quota exceeded".into()));
    assert_eq!(assistant.history().await.len(), 1);
}

#[tokio::test]
async fn newer_exchange_supersedes_slow_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"message": "slow"})))
        .respond_with(reply("late answer").set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"message": "fast"})))
        .respond_with(reply("quick answer"))
        .mount(&server)
        .await;

    let assistant = assistant(&server, Arc::new(MemoryStore::new()));
    let (tx, _rx) = mpsc::unbounded_channel();

    let slow = assistant.chat("slow", &tx);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assistant.chat("fast", &tx).await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow, ExchangeOutcome::Superseded);
    assert!(matches!(fast, ExchangeOutcome::Completed { .. }));

    let history = assistant.history().await;
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["slow", "fast", "quick answer"]);
}

#[tokio::test]
async fn history_restore_and_new_chat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "role": "user", "content": "hi", "timestamp": "2026-03-14T08:00:00"},
            {"id": 2, "role": "assistant", "content": "hello!", "timestamp": "2026-03-14T08:00:02"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = assistant(&server, Arc::new(MemoryStore::new()));
    assert_eq!(assistant.restore_history().await.unwrap(), 2);
    assert_eq!(assistant.history().await[1].content, "hello!");

    assistant.new_chat().await.unwrap();
    assert!(assistant.history().await.is_empty());
}

#[tokio::test]
async fn briefing_is_fetched_from_backend() {
    use liebe::briefing::{BriefingRequest, BriefingSource};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/morning_briefing"))
        .and(body_partial_json(json!({"city": "Mumbai", "notes": ["Buy milk"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "script": "Good morning! It is sunny.",
            "weather": "Sunny, 31°C",
            "news": "..."
        })))
        .mount(&server)
        .await;

    let mut config = LiebeConfig::default();
    config.server.base_url = server.uri();
    let client = ChatClient::from_config(&config);
    let script = client
        .fetch(&BriefingRequest {
            city: "Mumbai".into(),
            notes: vec!["Buy milk".into()],
        })
        .await
        .unwrap();
    assert_eq!(script.script, "Good morning! It is sunny.");
    assert_eq!(script.weather, "Sunny, 31°C");
}

/// Serve one chat request by hand: a chunk frame, a pause longer than the
/// client timeout, then `done`.
async fn slow_stream_server(pause: Duration) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                return;
            }
        }

        let chunk = |data: String| format!("{:x}\r\n{data}\r\n", data.len());
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        socket
            .write_all(chunk(frames(&[json!({"status": "chunk", "text": "Still "})])).as_bytes())
            .await
            .unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(pause).await;

        let done = frames(&[
            json!({"status": "chunk", "text": "thinking."}),
            json!({"status": "done", "full_text": "Still thinking.", "service": "gemini"}),
        ]);
        socket.write_all(chunk(done).as_bytes()).await.unwrap();
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn long_stream_outlives_request_timeout() {
    let mut config = LiebeConfig::default();
    config.server.base_url = slow_stream_server(Duration::from_millis(1500)).await;
    config.server.request_timeout_secs = 1;
    let assistant = Assistant::new(
        ChatClient::from_config(&config),
        Arc::new(MemoryStore::new()),
        Arc::new(Mutex::new(AlarmScheduler::new())),
        Arc::new(ManualClock::new(now())),
    );
    let (tx, _rx) = mpsc::unbounded_channel();

    let outcome = assistant.chat("think hard", &tx).await;

    let ExchangeOutcome::Completed { cleaned_text, .. } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(cleaned_text, "Still thinking.");
}

#[tokio::test]
async fn stalled_response_headers_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(reply("too late").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = LiebeConfig::default();
    config.server.base_url = server.uri();
    config.server.request_timeout_secs = 1;
    let assistant = Assistant::new(
        ChatClient::from_config(&config),
        Arc::new(MemoryStore::new()),
        Arc::new(Mutex::new(AlarmScheduler::new())),
        Arc::new(ManualClock::new(now())),
    );
    let (tx, _rx) = mpsc::unbounded_channel();

    let ExchangeOutcome::Failed(message) = assistant.chat("hello", &tx).await else {
        panic!("expected failure");
    };
    assert!(message.contains("no response within 1s"));
}
