//! crates/study_assistant_core/src/study.rs
//!
//! The study assistant itself: chat replies, quiz generation and flashcard
//! generation, each run through the model-fallback chain.

use crate::domain::{
    ChatMessage, ContentPart, FileAttachment, FlashcardDeck, GenerationRequest, Quiz, Role, Turn,
};
use crate::ports::{GenerativeModelService, PortError, PortResult};
use crate::prompts::{flashcard_prompt, quiz_prompt, TUTOR_SYSTEM_INSTRUCTION};
use crate::resilience::{with_model_fallback, RetryPolicy};
use crate::structured::{parse_flashcards, parse_quiz};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Candidate models, most preferred first.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.0-flash"];

pub fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

#[derive(Clone)]
pub struct StudyAssistant {
    model_service: Arc<dyn GenerativeModelService>,
    models: Vec<String>,
    retry: RetryPolicy,
}

impl StudyAssistant {
    pub fn new(
        model_service: Arc<dyn GenerativeModelService>,
        models: Vec<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            model_service,
            models,
            retry,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn model_service(&self) -> &Arc<dyn GenerativeModelService> {
        &self.model_service
    }

    /// Sends one request through the fallback chain and returns the raw reply text.
    async fn invoke(&self, request: &GenerationRequest) -> PortResult<String> {
        let service = &self.model_service;
        with_model_fallback(&self.models, &self.retry, |model| async move {
            service.generate(&model, request).await
        })
        .await
    }

    /// Produces a tutor reply to `message`, given the conversation so far.
    pub async fn send_message(
        &self,
        transcript: &[ChatMessage],
        message: &str,
        attachments: &[FileAttachment],
    ) -> PortResult<String> {
        let span = info_span!("send_message", request_id = %Uuid::new_v4());
        async {
            info!(
                history = transcript.len(),
                attachments = attachments.len(),
                "Generating chat reply"
            );

            let mut parts = Vec::with_capacity(attachments.len() + 1);
            if !message.trim().is_empty() {
                parts.push(ContentPart::Text(message.to_string()));
            }
            parts.extend(attachments.iter().map(ContentPart::from));

            let request = GenerationRequest {
                system_instruction: Some(TUTOR_SYSTEM_INSTRUCTION.to_string()),
                history: build_history(transcript),
                parts,
                json_output: false,
            };

            self.invoke(&request).await
        }
        .instrument(span)
        .await
    }

    /// Generates `count` multiple-choice questions about `topic` and/or the attachment.
    pub async fn generate_quiz(
        &self,
        topic: &str,
        attachment: Option<&FileAttachment>,
        difficulty: &str,
        count: u32,
    ) -> PortResult<Quiz> {
        validate_material(topic, attachment, count)?;
        let span = info_span!("generate_quiz", request_id = %Uuid::new_v4());
        async {
            info!(topic, difficulty, count, has_attachment = attachment.is_some(), "Generating quiz");
            let request = structured_request(
                quiz_prompt(topic, difficulty, count, attachment.is_some()),
                attachment,
            );
            let raw = self.invoke(&request).await?;
            let quiz = parse_quiz(&raw)?;
            info!(questions = quiz.questions.len(), "Quiz generated");
            Ok(quiz)
        }
        .instrument(span)
        .await
    }

    /// Generates `count` flashcards about `topic` and/or the attachment.
    pub async fn generate_flashcards(
        &self,
        topic: &str,
        attachment: Option<&FileAttachment>,
        count: u32,
    ) -> PortResult<FlashcardDeck> {
        validate_material(topic, attachment, count)?;
        let span = info_span!("generate_flashcards", request_id = %Uuid::new_v4());
        async {
            info!(topic, count, has_attachment = attachment.is_some(), "Generating flashcards");
            let request = structured_request(
                flashcard_prompt(topic, count, attachment.is_some()),
                attachment,
            );
            let raw = self.invoke(&request).await?;
            let deck = parse_flashcards(&raw)?;
            info!(flashcards = deck.flashcards.len(), "Flashcards generated");
            Ok(deck)
        }
        .instrument(span)
        .await
    }
}

fn validate_material(topic: &str, attachment: Option<&FileAttachment>, count: u32) -> PortResult<()> {
    if topic.trim().is_empty() && attachment.is_none() {
        return Err(PortError::InvalidInput(
            "a topic or an attachment is required".to_string(),
        ));
    }
    if count == 0 {
        return Err(PortError::InvalidInput(
            "count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn structured_request(prompt: String, attachment: Option<&FileAttachment>) -> GenerationRequest {
    let mut parts = vec![ContentPart::Text(prompt)];
    parts.extend(attachment.map(ContentPart::from));
    GenerationRequest {
        system_instruction: None,
        history: Vec::new(),
        parts,
        json_output: true,
    }
}

/// Stands in for a history entry whose text and attachments are both gone.
pub const SHARED_ATTACHMENT_PLACEHOLDER: &str = "[Shared an attachment]";

/// Converts a transcript into history turns.
///
/// The upstream API requires the first turn to be user-authored, so a leading
/// model entry (typically the UI's greeting) is dropped. Past attachments are
/// not replayed, and the upstream API rejects empty text parts, so an entry with
/// no text gets a placeholder naming its attachments when it still has them.
pub fn build_history(transcript: &[ChatMessage]) -> Vec<Turn> {
    let replay = match transcript.first() {
        Some(first) if first.role == Role::Model => &transcript[1..],
        _ => transcript,
    };

    replay
        .iter()
        .map(|message| {
            let text = if !message.content.trim().is_empty() {
                message.content.clone()
            } else if message.attachments.is_empty() {
                SHARED_ATTACHMENT_PLACEHOLDER.to_string()
            } else {
                let names: Vec<&str> = message.attachments.iter().map(|a| a.display_name()).collect();
                format!("[Shared attachment: {}]", names.join(", "))
            };
            Turn {
                role: message.role,
                parts: vec![ContentPart::Text(text)],
            }
        })
        .collect()
}
