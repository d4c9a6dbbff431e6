//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use study_assistant_core::{
    ChatMessage, FileAttachment, Flashcard, ModelInfo, QuizQuestion, Role,
};
use utoipa::ToSchema;

/// Recommended upper bound for generated questions or cards per request.
pub const MAX_ITEM_COUNT: u32 = 30;

fn default_count() -> u32 {
    10
}

fn default_difficulty() -> String {
    "medium".to_string()
}

//=========================================================================================
// Shared Pieces
//=========================================================================================

/// A file the user picked in the browser, transported as base64.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AttachmentPayload {
    /// Base64-encoded file contents.
    pub data: String,
    /// Media type such as `application/pdf` or `image/png`.
    pub mime_type: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl AttachmentPayload {
    /// Decodes the payload into a fully-read attachment.
    pub fn decode(&self) -> Result<FileAttachment, String> {
        if self.mime_type.trim().is_empty() {
            return Err("attachment mime_type is required".to_string());
        }
        // Browsers hand out data URLs; accept those as well as bare base64.
        let encoded = match self.data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.data.as_str(),
        };
        let data = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("attachment is not valid base64: {}", e))?;

        let attachment = FileAttachment::new(data, self.mime_type.trim());
        Ok(match &self.name {
            Some(name) => attachment.with_name(name.clone()),
            None => attachment,
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl From<ChatRole> for Role {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Role::User,
            ChatRole::Model => Role::Model,
        }
    }
}

/// One earlier turn of the conversation, as shown in the chat window.
#[derive(Deserialize, Debug, ToSchema)]
pub struct HistoryEntry {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
}

impl From<&HistoryEntry> for ChatMessage {
    fn from(entry: &HistoryEntry) -> Self {
        ChatMessage {
            role: entry.role.into(),
            content: entry.content.clone(),
            attachments: Vec::new(),
        }
    }
}

/// The body of every error response.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct QuizRequest {
    #[serde(default)]
    pub topic: String,
    /// Free text, e.g. "easy", "medium" or "hard".
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct FlashcardsRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct QuizQuestionDto {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl From<QuizQuestion> for QuizQuestionDto {
    fn from(q: QuizQuestion) -> Self {
        Self {
            question: q.question,
            options: q.options,
            answer: q.answer,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestionDto>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct FlashcardDto {
    pub front: String,
    pub back: String,
}

impl From<Flashcard> for FlashcardDto {
    fn from(card: Flashcard) -> Self {
        Self {
            front: card.front,
            back: card.back,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct FlashcardsResponse {
    pub flashcards: Vec<FlashcardDto>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ModelDto {
    pub id: String,
    pub display_name: Option<String>,
    pub supports_generate_content: bool,
}

impl From<&ModelInfo> for ModelDto {
    fn from(model: &ModelInfo) -> Self {
        Self {
            id: model.id().to_string(),
            display_name: model.display_name.clone(),
            supports_generate_content: model.supports_generate_content(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<ModelDto>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(data: &str) -> AttachmentPayload {
        AttachmentPayload {
            data: data.to_string(),
            mime_type: "image/png".to_string(),
            name: Some("diagram.png".to_string()),
        }
    }

    #[test]
    fn decodes_plain_base64_and_data_urls() {
        let plain = payload("AQID").decode().unwrap();
        assert_eq!(plain.data, vec![1, 2, 3]);
        assert_eq!(plain.name.as_deref(), Some("diagram.png"));

        let data_url = payload("data:image/png;base64,AQID").decode().unwrap();
        assert_eq!(data_url.data, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_bad_base64_and_missing_mime_type() {
        assert!(payload("not base64!").decode().is_err());

        let mut missing = payload("AQID");
        missing.mime_type = " ".to_string();
        assert!(missing.decode().is_err());
    }
}
