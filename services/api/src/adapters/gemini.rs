//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for Google's Gemini generative-language REST API.
//! It implements the `GenerativeModelService` port from the `core` crate.

use crate::config::GeminiConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use study_assistant_core::{
    ContentPart, GenerationRequest, GenerativeModelService, ModelInfo, PortError, PortResult, Role,
};
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

//=========================================================================================
// Wire Format
//=========================================================================================

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Serialize, Debug)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireInlineData>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireResponseContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Deserialize, Debug)]
struct WireResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<WireModel>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireModel {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct WireErrorBody {
    error: WireError,
}

#[derive(Deserialize, Debug)]
struct WireError {
    message: String,
}

fn text_part(text: &str) -> WirePart {
    WirePart {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

fn to_wire_part(part: &ContentPart) -> WirePart {
    match part {
        ContentPart::Text(text) => text_part(text),
        ContentPart::InlineData { mime_type, data } => WirePart {
            text: None,
            inline_data: Some(WireInlineData {
                mime_type: mime_type.clone(),
                data: general_purpose::STANDARD.encode(data),
            }),
        },
    }
}

fn to_wire_request(request: &GenerationRequest) -> GenerateContentRequest {
    let mut contents: Vec<WireContent> = request
        .history
        .iter()
        .map(|turn| WireContent {
            role: Some(turn.role.as_str()),
            parts: turn.parts.iter().map(to_wire_part).collect(),
        })
        .collect();
    contents.push(WireContent {
        role: Some(Role::User.as_str()),
        parts: request.parts.iter().map(to_wire_part).collect(),
    });

    GenerateContentRequest {
        system_instruction: request.system_instruction.as_deref().map(|text| WireContent {
            role: None,
            parts: vec![text_part(text)],
        }),
        contents,
        generation_config: request.json_output.then_some(WireGenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerativeModelService` over the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
    api_key: Option<String>,
    api_base: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`. A missing key is only reported when a call is made.
    pub fn new(config: &GeminiConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn api_key(&self) -> PortResult<&str> {
        self.api_key.as_deref().ok_or(PortError::MissingApiKey)
    }

    /// Converts a non-success response into an upstream error carrying its status.
    async fn error_from_response(response: Response) -> PortError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<WireErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        PortError::upstream(
            Some(status.as_u16()),
            format!(
                "[{} {}] {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Error"),
                detail.trim()
            ),
        )
    }

    fn transport_error(e: reqwest::Error) -> PortError {
        PortError::upstream(
            e.status().map(|s| s.as_u16()),
            format!("Error fetching from the Gemini API: {}", e),
        )
    }

    /// A success response whose body is not the expected JSON. Not retryable.
    fn decode_error(e: reqwest::Error) -> PortError {
        let status = e.status().map(|s| s.as_u16()).or(Some(200));
        PortError::upstream(
            status,
            format!("Gemini returned an unreadable response: {}", e.without_url()),
        )
    }
}

//=========================================================================================
// `GenerativeModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerativeModelService for GeminiAdapter {
    async fn generate(&self, model: &str, request: &GenerationRequest) -> PortResult<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        debug!(model, parts = request.parts.len(), history = request.history.len(), "POST generateContent");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&to_wire_request(request))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(Self::decode_error)?;

        let candidate = payload.candidates.into_iter().next();
        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = payload
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .or_else(|| candidate.and_then(|c| c.finish_reason))
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(PortError::upstream(
                None,
                format!("Gemini returned an empty response (reason: {})", reason),
            ));
        }

        Ok(text)
    }

    async fn list_models(&self) -> PortResult<Vec<ModelInfo>> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1beta/models", self.api_base);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, api_key)
                .query(&query)
                .send()
                .await
                .map_err(Self::transport_error)?;

            if !response.status().is_success() {
                return Err(Self::error_from_response(response).await);
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .map_err(Self::decode_error)?;

            models.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                display_name: m.display_name,
                supported_generation_methods: m.supported_generation_methods,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}
