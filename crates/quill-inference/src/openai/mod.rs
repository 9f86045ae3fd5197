//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the `/chat/completions` protocol:
//!
//! - Google Gemini (OpenAI compatibility layer, the default)
//! - OpenAI cloud API
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM, LocalAI, LM Studio
//!
//! # Example
//!
//! ```rust,no_run
//! use quill_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use quill_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(), // Ollama
//!         api_key: None,
//!         gen_model: "llama3".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let text = backend.generate("Say hello").await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{to_quill_error, OpenAIErrorCode};
pub use types::*;
