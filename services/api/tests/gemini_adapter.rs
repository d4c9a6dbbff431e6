use api_lib::{adapters::GeminiAdapter, config::GeminiConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use study_assistant_core::{
    resilience::{classify, FailureClass},
    ContentPart, GenerationRequest, GenerativeModelService, PortError, RetryPolicy,
    StudyAssistant,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter_for(server: &MockServer, api_key: Option<&str>) -> GeminiAdapter {
    let mut config = GeminiConfig::new(api_key.map(str::to_string));
    config.api_base = server.uri();
    GeminiAdapter::new(&config).unwrap()
}

/// Two candidates and three attempts each, so a retried failure would show up as extra requests.
fn assistant_for(server: &MockServer) -> StudyAssistant {
    StudyAssistant::new(
        Arc::new(adapter_for(server, Some("test-key"))),
        vec!["gemini-a".to_string(), "gemini-b".to_string()],
        RetryPolicy::new(3, Duration::from_millis(1)),
    )
}

fn prompt(text: &str) -> GenerationRequest {
    GenerationRequest {
        parts: vec![ContentPart::Text(text.to_string())],
        ..Default::default()
    }
}

#[tokio::test]
async fn generate_sends_key_header_and_joins_text_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Explain osmosis" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Osmosis is " }, { "text": "water diffusion." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = adapter_for(&server, Some("test-key"))
        .generate("gemini-2.5-flash", &prompt("Explain osmosis"))
        .await
        .unwrap();

    assert_eq!(reply, "Osmosis is water diffusion.");
}

#[tokio::test]
async fn upstream_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "code": 429,
                "message": "You exceeded your current quota, please check your plan and billing details.",
                "status": "RESOURCE_EXHAUSTED"
            }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server, Some("test-key"))
        .generate("gemini-2.5-flash", &prompt("hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert!(err.to_string().contains("You exceeded your current quota"));
    assert_eq!(classify(&err), FailureClass::Quota);
}

#[tokio::test]
async fn missing_model_is_classified_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "models/gemini-0 is not found for API version v1beta", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server, Some("test-key"))
        .generate("gemini-0", &prompt("hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(classify(&err), FailureClass::ModelUnavailable);
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = adapter_for(&server, None)
        .generate("gemini-2.5-flash", &prompt("hi"))
        .await
        .unwrap_err();

    assert_eq!(err, PortError::MissingApiKey);
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn blocked_prompt_reports_the_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server, Some("test-key"))
        .generate("gemini-2.5-flash", &prompt("hi"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("SAFETY"));
    assert_eq!(classify(&err), FailureClass::Fatal);
}

#[tokio::test]
async fn unreachable_service_is_a_retryable_fetch_failure() {
    // Nothing listens on port 1, so the connection is refused.
    let mut config = GeminiConfig::new(Some("test-key".to_string()));
    config.api_base = "http://127.0.0.1:1".to_string();
    let adapter = GeminiAdapter::new(&config).unwrap();

    let err = adapter
        .generate("gemini-2.5-flash", &prompt("hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), None);
    assert!(err.to_string().contains("fetch"));
    assert_eq!(classify(&err), FailureClass::Transient);
}

#[tokio::test]
async fn list_models_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": "models/gemini-2.5-flash",
                "displayName": "Gemini 2.5 Flash",
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            }],
            "nextPageToken": "next"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let models = adapter_for(&server, Some("test-key")).list_models().await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id(), "gemini-2.5-flash");
    assert!(models[0].supports_generate_content());
    assert_eq!(models[1].id(), "embedding-001");
    assert!(!models[1].supports_generate_content());
}

#[tokio::test]
async fn unreadable_success_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = assistant_for(&server)
        .send_message(&[], "Explain osmosis", &[])
        .await
        .unwrap_err();

    assert!(!matches!(err, PortError::ModelsExhausted(_)), "got {err:?}");
    assert!(err.to_string().contains("unreadable response"));
    assert_eq!(classify(&err), FailureClass::Fatal);
}

#[tokio::test]
async fn wrong_shaped_success_body_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": "nope" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter_for(&server, Some("test-key"))
        .generate("gemini-2.5-flash", &prompt("hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(200));
    assert!(!err.to_string().contains("fetch"));
    assert_eq!(classify(&err), FailureClass::Fatal);
}

#[tokio::test]
async fn internal_server_error_stops_the_fallback_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "Internal error encountered.", "status": "INTERNAL" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = assistant_for(&server)
        .send_message(&[], "hi", &[])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("Internal error encountered."));
    assert_eq!(classify(&err), FailureClass::Fatal);
}
