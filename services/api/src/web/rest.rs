//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    AttachmentPayload, ChatRequest, ChatResponse, ChatRole, ErrorResponse, FlashcardDto,
    FlashcardsRequest, FlashcardsResponse, HealthResponse, HistoryEntry, ModelDto,
    ModelsResponse, QuizQuestionDto, QuizRequest, QuizResponse, MAX_ITEM_COUNT,
};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use study_assistant_core::{resilience::is_quota_error, ChatMessage, FileAttachment, PortError};
use tracing::{error, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_handler,
        quiz_handler,
        flashcards_handler,
        list_models_handler,
        health_handler,
    ),
    components(
        schemas(
            ChatRequest, ChatResponse, ChatRole, HistoryEntry, AttachmentPayload,
            QuizRequest, QuizResponse, QuizQuestionDto,
            FlashcardsRequest, FlashcardsResponse, FlashcardDto,
            ModelsResponse, ModelDto, HealthResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Study Assistant API", description = "Chat tutor, quiz and flashcard generation backed by Gemini.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Maps a core failure onto an HTTP status; the message is passed through for display.
fn port_error_response(e: PortError) -> HandlerError {
    let status = match &e {
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::MissingApiKey | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PortError::ModelsExhausted(_) if is_quota_error(&e) => StatusCode::TOO_MANY_REQUESTS,
        PortError::ModelsExhausted(_)
        | PortError::Upstream { .. }
        | PortError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    error_response(status, e.to_string())
}

fn validate_count(count: u32) -> Result<(), HandlerError> {
    if count == 0 || count > MAX_ITEM_COUNT {
        return Err(bad_request(format!(
            "count must be between 1 and {}",
            MAX_ITEM_COUNT
        )));
    }
    Ok(())
}

fn decode_attachment(payload: Option<&AttachmentPayload>) -> Result<Option<FileAttachment>, HandlerError> {
    payload.map(|p| p.decode().map_err(bad_request)).transpose()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Send a chat message to the study tutor.
///
/// The reply is generated from the earlier conversation, the new message and any
/// attached files. A message may be empty only when at least one file is attached.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Tutor reply", body = ChatResponse),
        (status = 400, description = "Empty message without attachments, or an undecodable attachment", body = ErrorResponse),
        (status = 429, description = "Quota exceeded on every model", body = ErrorResponse),
        (status = 502, description = "The model service failed", body = ErrorResponse),
        (status = 500, description = "Server misconfiguration (e.g. missing API key)", body = ErrorResponse)
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, HandlerError> {
    if req.message.trim().is_empty() && req.attachments.is_empty() {
        return Err(bad_request("message must not be empty unless a file is attached"));
    }

    let attachments = req
        .attachments
        .iter()
        .map(|a| a.decode().map_err(bad_request))
        .collect::<Result<Vec<_>, _>>()?;
    let transcript: Vec<ChatMessage> = req.history.iter().map(ChatMessage::from).collect();

    let reply = app_state
        .assistant
        .send_message(&transcript, &req.message, &attachments)
        .await
        .map_err(port_error_response)?;

    Ok(Json(ChatResponse { reply }))
}

/// Generate a multiple-choice quiz about a topic and/or an attached file.
#[utoipa::path(
    post,
    path = "/quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Generated quiz", body = QuizResponse),
        (status = 400, description = "Missing topic and attachment, or count out of range", body = ErrorResponse),
        (status = 429, description = "Quota exceeded on every model", body = ErrorResponse),
        (status = 502, description = "The model service failed or returned malformed output", body = ErrorResponse),
        (status = 500, description = "Server misconfiguration (e.g. missing API key)", body = ErrorResponse)
    )
)]
pub async fn quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, HandlerError> {
    validate_count(req.count)?;
    let attachment = decode_attachment(req.attachment.as_ref())?;

    let quiz = app_state
        .assistant
        .generate_quiz(&req.topic, attachment.as_ref(), &req.difficulty, req.count)
        .await
        .map_err(port_error_response)?;

    Ok(Json(QuizResponse {
        questions: quiz.questions.into_iter().map(QuizQuestionDto::from).collect(),
    }))
}

/// Generate study flashcards about a topic and/or an attached file.
#[utoipa::path(
    post,
    path = "/flashcards",
    request_body = FlashcardsRequest,
    responses(
        (status = 200, description = "Generated flashcards", body = FlashcardsResponse),
        (status = 400, description = "Missing topic and attachment, or count out of range", body = ErrorResponse),
        (status = 429, description = "Quota exceeded on every model", body = ErrorResponse),
        (status = 502, description = "The model service failed or returned malformed output", body = ErrorResponse),
        (status = 500, description = "Server misconfiguration (e.g. missing API key)", body = ErrorResponse)
    )
)]
pub async fn flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<FlashcardsRequest>,
) -> Result<Json<FlashcardsResponse>, HandlerError> {
    validate_count(req.count)?;
    let attachment = decode_attachment(req.attachment.as_ref())?;

    let deck = app_state
        .assistant
        .generate_flashcards(&req.topic, attachment.as_ref(), req.count)
        .await
        .map_err(port_error_response)?;

    Ok(Json(FlashcardsResponse {
        flashcards: deck.flashcards.into_iter().map(FlashcardDto::from).collect(),
    }))
}

/// List the models visible to the configured API key.
#[utoipa::path(
    get,
    path = "/models",
    responses(
        (status = 200, description = "Available models", body = ModelsResponse),
        (status = 502, description = "The model service failed", body = ErrorResponse),
        (status = 500, description = "Server misconfiguration (e.g. missing API key)", body = ErrorResponse)
    )
)]
pub async fn list_models_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ModelsResponse>, HandlerError> {
    let models = app_state
        .assistant
        .model_service()
        .list_models()
        .await
        .map_err(port_error_response)?;

    Ok(Json(ModelsResponse {
        models: models.iter().map(ModelDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The server is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
