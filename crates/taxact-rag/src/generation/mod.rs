//! Answer generation with prompt templates and citation formatting

pub mod generator;
pub mod prompt;

pub use generator::{AnswerGenerator, GenerationParams};
pub use prompt::PromptBuilder;
