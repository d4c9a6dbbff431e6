//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contract (trait) between the core logic and the external
//! generative-language service. The core never sees HTTP, JSON wire formats or
//! API keys; an adapter in the `api` service implements this port.

use async_trait::async_trait;
use crate::domain::{GenerationRequest, ModelInfo};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// No API key was configured; no request was attempted.
    #[error("Gemini API key is missing. Set GEMINI_API_KEY in your environment or .env file and restart the server.")]
    MissingApiKey,

    /// A failure reported by the external service or the transport underneath it.
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    /// Every candidate model failed.
    #[error("{0}")]
    ModelsExhausted(String),

    /// The model answered, but not with the structure that was asked for.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        PortError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// The status code carried by an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PortError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait GenerativeModelService: Send + Sync {
    /// Submits one request against the named model and returns the reply text.
    async fn generate(&self, model: &str, request: &GenerationRequest) -> PortResult<String>;

    /// Lists the models the configured key can see.
    async fn list_models(&self) -> PortResult<Vec<ModelInfo>>;
}
