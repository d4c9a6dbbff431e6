//! crates/study_assistant_core/src/structured.rs
//!
//! Turns the model's raw text into validated quizzes and flashcard decks.

use crate::domain::{FlashcardDeck, Quiz};
use crate::ports::{PortError, PortResult};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Removes every "```json" and "```" fence marker and trims the result.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| PortError::MalformedResponse(e.to_string()))
}

pub fn parse_quiz(raw: &str) -> PortResult<Quiz> {
    let quiz: Quiz = parse_json(raw)?;

    if quiz.questions.is_empty() {
        return Err(PortError::MalformedResponse(
            "quiz contained no questions".to_string(),
        ));
    }
    for (i, q) in quiz.questions.iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(PortError::MalformedResponse(format!(
                "question {} has no text",
                i + 1
            )));
        }
        if q.options.len() < 2 {
            return Err(PortError::MalformedResponse(format!(
                "question {} has fewer than two options",
                i + 1
            )));
        }
        if q.answer.trim().is_empty() {
            return Err(PortError::MalformedResponse(format!(
                "question {} has no answer",
                i + 1
            )));
        }
        if !q.options.iter().any(|o| o.trim() == q.answer.trim()) {
            warn!(question = i + 1, answer = %q.answer, "Answer does not match any option");
        }
    }

    Ok(quiz)
}

pub fn parse_flashcards(raw: &str) -> PortResult<FlashcardDeck> {
    let deck: FlashcardDeck = parse_json(raw)?;

    if deck.flashcards.is_empty() {
        return Err(PortError::MalformedResponse(
            "deck contained no flashcards".to_string(),
        ));
    }
    if let Some(i) = deck
        .flashcards
        .iter()
        .position(|c| c.front.trim().is_empty() || c.back.trim().is_empty())
    {
        return Err(PortError::MalformedResponse(format!(
            "flashcard {} is missing a side",
            i + 1
        )));
    }

    Ok(deck)
}
