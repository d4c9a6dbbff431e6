pub mod domain;
pub mod ports;
pub mod prompts;
pub mod resilience;
pub mod structured;
pub mod study;

pub use domain::{
    ChatMessage, ContentPart, FileAttachment, Flashcard, FlashcardDeck, GenerationRequest,
    ModelInfo, Quiz, QuizQuestion, Role, Turn,
};
pub use ports::{GenerativeModelService, PortError, PortResult};
pub use resilience::RetryPolicy;
pub use study::{default_models, StudyAssistant, DEFAULT_MODELS};
