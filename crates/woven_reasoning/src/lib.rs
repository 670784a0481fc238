pub mod analyzer;
pub mod api_types;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod validator;

pub use analyzer::ChoiceAnalyzer;
pub use llm::{GenerationError, GenerationParams, TextGenerator};
pub use orchestrator::{SessionStatus, StoryOrchestrator, StoryView, TurnError, TurnOutcome};
pub use parser::{parse_reply, ParsedReply};
pub use validator::{EmotionalValidator, ValidationError};
