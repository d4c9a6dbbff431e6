//! services/api/src/bin/api.rs

use api_lib::{
    adapters::GeminiAdapter,
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method};
use std::sync::Arc;
use study_assistant_core::StudyAssistant;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Model Adapter ---
    if config.gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set. Every model request will fail until it is configured.");
    }
    let gemini_adapter = Arc::new(GeminiAdapter::new(&config.gemini)?);

    // --- 3. Build the Shared AppState ---
    let assistant = Arc::new(StudyAssistant::new(
        gemini_adapter,
        config.gemini.models.clone(),
        config.gemini.retry,
    ));
    info!(
        models = ?assistant.models(),
        max_retries = config.gemini.retry.max_retries,
        "Model fallback chain configured"
    );
    let app_state = Arc::new(AppState {
        config: config.clone(),
        assistant,
    });

    // --- 4. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = build_router(app_state).layer(cors);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
