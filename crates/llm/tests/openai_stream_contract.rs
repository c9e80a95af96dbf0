//! OpenAI streaming contract tests
//!
//! Verify the request body sent to `/chat/completions` and the parsing of
//! server-sent event streams, against a local mock server.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use robot_chat_core::{ChatMode, ChatModel, ChatRequest, Error, Frame, Message, StreamEvent};
use robot_chat_llm::{OpenAIBackend, OpenAIConfig};

fn sse_body(tokens: &[&str]) -> String {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for token in tokens {
        let chunk = json!({"choices": [{"delta": {"content": token}}]});
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(tokens: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(tokens), "text/event-stream")
}

fn backend(server: &MockServer) -> OpenAIBackend {
    let config = OpenAIConfig::local(format!("{}/v1", server.uri()), "gpt-4-turbo")
        .with_motion_instruction("motions: nod, bow");
    OpenAIBackend::new(config).unwrap()
}

async fn collect(backend: &OpenAIBackend, request: ChatRequest) -> Vec<StreamEvent> {
    let mut stream = backend.stream_chat(request).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }
    events
}

#[tokio::test]
async fn test_streamed_tokens_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer not-needed"))
        .and(body_partial_json(json!({
            "model": "gpt-4-turbo",
            "stream": true,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "こんにちは"}
            ]
        })))
        .respond_with(sse_response(&["こん", "にちは", "。"]))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new(
        vec![Message::system("sys"), Message::user("こんにちは")],
        "gpt-4-turbo",
    );
    let events = collect(&backend(&server), request).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Token("こん".to_string()),
            StreamEvent::Token("にちは".to_string()),
            StreamEvent::Token("。".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_request_model_overrides_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(sse_response(&["はい。"]))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new(vec![Message::user("x")], "gpt-4o");
    let events = collect(&backend(&server), request).await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_vision_message_sent_as_content_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": "これは何?"}]
            }]
        })))
        .respond_with(sse_response(&["ペンです。"]))
        .expect(1)
        .mount(&server)
        .await;

    let frame = Frame::new(1, 1, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    let request = ChatRequest::new(vec![Message::vision("これは何?", frame)], "gpt-4o");
    let events = collect(&backend(&server), request).await;
    assert_eq!(events, vec![StreamEvent::Token("ペンです。".to_string())]);
}

#[tokio::test]
async fn test_motion_tag_reported_out_of_band() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(&["[motion:", "nod]", "はい。"]))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new(vec![Message::user("こんにちは")], "gpt-4-turbo")
        .with_mode(ChatMode::ChatWithMotion);
    let events = collect(&backend(&server), request).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Motion("nod".to_string()),
            StreamEvent::Token("はい。".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_http_error_fails_stream_open() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let result = backend(&server)
        .stream_chat(ChatRequest::new(vec![Message::user("x")], ""))
        .await;

    match result {
        Err(Error::Llm(message)) => assert!(message.contains("500")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("stream should not open"),
    }
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(&["遅い。"]).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let mut config = OpenAIConfig::local(format!("{}/v1", server.uri()), "gpt-4-turbo");
    config.idle_timeout = Duration::from_millis(50);
    let backend = OpenAIBackend::new(config).unwrap();

    let result = backend
        .stream_chat(ChatRequest::new(vec![Message::user("x")], ""))
        .await;
    assert!(matches!(result, Err(Error::Timeout(_))));
}

/// Read one HTTP request, headers and body
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);

        let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= head_end + 4 + length {
            return;
        }
    }
}

/// Answer a single request with `body`, written in two parts split at `at`
async fn serve_in_two_writes(body: Vec<u8>, at: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body[..at]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        socket.write_all(&body[at..]).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{}/v1", addr)
}

#[tokio::test]
async fn test_character_split_across_writes() {
    let body = sse_body(&["こんにちは。"]).into_bytes();
    let start = body
        .windows("こ".len())
        .position(|w| w == "こ".as_bytes())
        .unwrap();
    let endpoint = serve_in_two_writes(body, start + 1).await;

    let backend = OpenAIBackend::new(OpenAIConfig::local(endpoint, "gpt-4-turbo")).unwrap();
    let events = collect(&backend, ChatRequest::new(vec![Message::user("x")], "")).await;

    assert_eq!(events, vec![StreamEvent::Token("こんにちは。".to_string())]);
}
