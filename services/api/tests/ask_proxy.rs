use interview_api::{AppState, router};
use interview_core::gateway::{
    DEFAULT_CHAT_MODEL, GatewayError, ModelGateway, OpenAiClient, ProxyGateway,
};
use interview_core::turn::Turn;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn spawn_proxy(client: OpenAiClient) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(AppState::new(client)))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

fn keyed_client(upstream: &MockServer) -> OpenAiClient {
    OpenAiClient::new(Some(SecretString::from("sk-test".to_string())), DEFAULT_CHAT_MODEL)
        .with_base_url(upstream.uri())
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-42",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
    })
}

#[tokio::test]
async fn test_get_is_rejected_with_405() {
    let base = spawn_proxy(OpenAiClient::new(None, DEFAULT_CHAT_MODEL)).await;

    let resp = reqwest::get(format!("{base}/api/ask")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Only POST allowed" }));
}

#[tokio::test]
async fn test_missing_key_is_a_500() {
    let base = spawn_proxy(OpenAiClient::new(None, DEFAULT_CHAT_MODEL)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "OPENAI_API_KEY not configured" }));
}

#[tokio::test]
async fn test_success_payload_is_passed_through_verbatim() {
    // --- Arrange ---
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "Ты — нормальный интервьюер" },
                { "role": "user", "content": "Готов" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Первый вопрос?")))
        .expect(1)
        .mount(&upstream)
        .await;
    let base = spawn_proxy(keyed_client(&upstream)).await;

    // --- Act ---
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({
            "messages": [
                { "role": "system", "content": "Ты — нормальный интервьюер" },
                { "role": "user", "content": "Готов" }
            ]
        }))
        .send()
        .await
        .unwrap();

    // --- Assert ---
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, completion("Первый вопрос?"));
}

#[tokio::test]
async fn test_upstream_status_and_message_are_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached", "type": "requests" }
        })))
        .mount(&upstream)
        .await;
    let base = spawn_proxy(keyed_client(&upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Rate limit reached" }));
}

#[tokio::test]
async fn test_upstream_error_without_message_gets_a_generic_one() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({})))
        .mount(&upstream)
        .await;
    let base = spawn_proxy(keyed_client(&upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "OpenAI API error" }));
}

#[tokio::test]
async fn test_unparsable_body_is_a_400() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("never")))
        .expect(0)
        .mount(&upstream)
        .await;
    let base = spawn_proxy(keyed_client(&upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_proxy_gateway_round_trip() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Расскажите о себе")))
        .mount(&upstream)
        .await;
    let base = spawn_proxy(keyed_client(&upstream)).await;

    let gateway = ProxyGateway::new(base);
    let turn = gateway.complete(&[Turn::system("интервьюер")]).await.unwrap();

    assert_eq!(turn, Turn::assistant("Расскажите о себе"));
}

#[tokio::test]
async fn test_proxy_gateway_surfaces_proxy_errors() {
    let base = spawn_proxy(OpenAiClient::new(None, DEFAULT_CHAT_MODEL)).await;

    let gateway = ProxyGateway::new(base);
    let err = gateway.complete(&[Turn::user("hi")]).await.unwrap_err();

    match err {
        GatewayError::Upstream { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "OPENAI_API_KEY not configured");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}
