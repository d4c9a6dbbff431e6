pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use rest::{chat_handler, flashcards_handler, health_handler, list_models_handler, quiz_handler, ApiDoc};
use state::AppState;

/// Attachments travel base64-encoded inside JSON bodies, so allow generous requests.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Builds the full application router: API routes plus the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/chat", post(chat_handler))
        .route("/quiz", post(quiz_handler))
        .route("/flashcards", post(flashcards_handler))
        .route("/models", get(list_models_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
