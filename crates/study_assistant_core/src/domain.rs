//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! The structured study material (quizzes and flashcards) derives `serde`
//! traits because it is produced by parsing the model's JSON output.

use serde::{Deserialize, Serialize};

/// Who authored a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A binary file (document or image) the user attached to a prompt.
///
/// The payload is fully read into memory before it is referenced in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub name: Option<String>,
}

impl FileAttachment {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name shown to the model when the attachment is only referenced.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("file")
    }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<FileAttachment>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// The full set of questions produced for one quiz request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

/// A two-sided study card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub flashcards: Vec<Flashcard>,
}

//=========================================================================================
// Generation Request (the shape handed to the model port)
//=========================================================================================

/// A piece of content submitted to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl From<&FileAttachment> for ContentPart {
    fn from(attachment: &FileAttachment) -> Self {
        ContentPart::InlineData {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
        }
    }
}

/// A previous turn replayed to the model as conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

/// Everything the model needs for one call, independent of the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<Turn>,
    pub parts: Vec<ContentPart>,
    /// Ask the model to answer with a JSON document.
    pub json_output: bool,
}

/// A model advertised by the upstream model-listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// The identifier without the `models/` resource prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}
