//! Answer generation: prompt rendering, LLM callbacks and the RAG service

pub mod llm;
pub mod ollama;
pub mod prompt;
pub mod rag;

pub use llm::{callback_fn, FnCallback, LlmCallback};
pub use ollama::{OllamaClient, OllamaLlm};
pub use prompt::{PromptBuilder, DEFAULT_TEMPLATE};
pub use rag::RagService;
