use api_lib::{
    config::{Config, GeminiConfig},
    web::{build_router, state::AppState},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use study_assistant_core::{
    ContentPart, GenerationRequest, GenerativeModelService, ModelInfo, PortError, PortResult, RetryPolicy,
    StudyAssistant,
};
use tower::ServiceExt;

/// Answers every call with the same result and records the requests it saw.
struct FixedModel {
    reply: PortResult<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

#[async_trait]
impl GenerativeModelService for FixedModel {
    async fn generate(&self, _model: &str, request: &GenerationRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }

    async fn list_models(&self) -> PortResult<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            name: "models/gemini-2.5-flash".to_string(),
            display_name: Some("Gemini 2.5 Flash".to_string()),
            supported_generation_methods: vec!["generateContent".to_string()],
        }])
    }
}

fn app(reply: PortResult<String>) -> (Router, Arc<FixedModel>) {
    let model = Arc::new(FixedModel {
        reply,
        requests: Mutex::new(Vec::new()),
    });
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: tracing::Level::INFO,
        cors_origin: "http://localhost:5173".to_string(),
        gemini: GeminiConfig::new(Some("test-key".to_string())),
    };
    let assistant = StudyAssistant::new(
        model.clone(),
        vec!["first".to_string(), "second".to_string()],
        RetryPolicy::new(1, Duration::from_millis(1)),
    );
    let state = Arc::new(AppState {
        config: Arc::new(config),
        assistant: Arc::new(assistant),
    });
    (build_router(state), model)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn chat_returns_reply_and_drops_leading_greeting() {
    let (app, model) = app(Ok("Chlorophyll absorbs light.".to_string()));

    let (status, body) = post_json(
        app,
        "/chat",
        json!({
            "history": [
                { "role": "model", "content": "Hi! What are we studying?" },
                { "role": "user", "content": "Plants" },
                { "role": "model", "content": "Great." }
            ],
            "message": "What absorbs light?",
            "attachments": [{ "data": "AQID", "mime_type": "image/png", "name": "leaf.png" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Chlorophyll absorbs light.");
    let requests = model.requests.lock().unwrap();
    assert_eq!(requests[0].history.len(), 2);
    assert_eq!(requests[0].parts.len(), 2);
}

#[tokio::test]
async fn follow_up_after_attachment_only_turn_has_no_blank_history() {
    let (app, model) = app(Ok("It covers the Krebs cycle.".to_string()));

    let (status, _) = post_json(
        app,
        "/chat",
        json!({
            "history": [
                { "role": "user", "content": "" },
                { "role": "model", "content": "Got your file." }
            ],
            "message": "Summarize it"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let requests = model.requests.lock().unwrap();
    assert_eq!(requests[0].history.len(), 2);
    for turn in &requests[0].history {
        for part in &turn.parts {
            if let ContentPart::Text(text) = part {
                assert!(!text.trim().is_empty());
            }
        }
    }
}

#[tokio::test]
async fn empty_chat_message_without_attachment_is_rejected() {
    let (app, model) = app(Ok("unused".to_string()));

    let (status, body) = post_json(app, "/chat", json!({ "message": "   " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("message"));
    assert!(model.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn quiz_returns_parsed_questions() {
    let raw = "```json\n{\"questions\":[{\"question\":\"What pigment absorbs light?\",\"options\":[\"Chlorophyll\",\"Keratin\",\"Melanin\"],\"answer\":\"Chlorophyll\"}]}\n```";
    let (app, _) = app(Ok(raw.to_string()));

    let (status, body) = post_json(
        app,
        "/quiz",
        json!({ "topic": "Photosynthesis", "difficulty": "easy", "count": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questions"].as_array().unwrap().len(), 1);
    assert_eq!(body["questions"][0]["answer"], "Chlorophyll");
    assert_eq!(body["questions"][0]["options"][2], "Melanin");
}

#[tokio::test]
async fn quiz_count_above_limit_is_rejected() {
    let (app, _) = app(Ok("{}".to_string()));

    let (status, _) = post_json(app, "/quiz", json!({ "topic": "Cells", "count": 31 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn flashcards_without_topic_or_attachment_is_rejected() {
    let (app, _) = app(Ok("{}".to_string()));

    let (status, body) = post_json(app, "/flashcards", json!({ "topic": "", "count": 5 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("topic"));
}

#[tokio::test]
async fn flashcards_with_bad_attachment_is_rejected() {
    let (app, _) = app(Ok("{}".to_string()));

    let (status, _) = post_json(
        app,
        "/flashcards",
        json!({ "count": 5, "attachment": { "data": "%%%", "mime_type": "application/pdf" } }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quota_exhaustion_is_reported_as_too_many_requests() {
    let (app, _) = app(Err(PortError::upstream(Some(429), "[429 Too Many Requests] quota exceeded")));

    let (status, body) = post_json(app, "/flashcards", json!({ "topic": "Cells", "count": 5 })).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Quota"));
}

#[tokio::test]
async fn malformed_model_output_is_a_bad_gateway() {
    let (app, _) = app(Ok("not json at all".to_string()));

    let (status, body) = post_json(app, "/quiz", json!({ "topic": "Cells", "count": 2 })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Malformed model response"));
}

#[tokio::test]
async fn models_and_health_endpoints() {
    let (app, _) = app(Ok(String::new()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["models"][0]["id"], "gemini-2.5-flash");
    assert_eq!(body["models"][0]["supports_generate_content"], true);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
