//! # quill-inference
//!
//! Generative text backends for quill.
//!
//! This crate provides:
//! - An OpenAI-compatible chat completion backend (Gemini, OpenAI, Ollama
//!   and other compatible endpoints)
//! - The note rephrasing operation built on top of it
//! - A mock backend for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use quill_inference::{rephrase, OpenAIBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env()
//!         .unwrap()
//!         .expect("LLM_API_KEY or LLM_BASE_URL must be set");
//!     let clearer = rephrase(&backend, "<p>me and him goes to store</p>").await.unwrap();
//!     println!("{}", clearer);
//! }
//! ```

pub mod openai;
pub mod rephrase;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use quill_core::*;

pub use openai::{OpenAIBackend, OpenAIConfig};
pub use rephrase::{clean_generated_text, rephrase, REPHRASE_SYSTEM_PROMPT};
