//! Mock generation backend for deterministic testing.
//!
//! ```rust,ignore
//! use quill_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new().with_response("<p>Rewritten</p>");
//! let text = backend.generate("anything").await.unwrap();
//! assert_eq!(text, "<p>Rewritten</p>");
//! assert_eq!(backend.calls().len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quill_core::{Error, GenerationBackend, Result};

/// A recorded generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

/// Mock generation backend returning a fixed answer or a fixed failure.
#[derive(Clone)]
pub struct MockGenerationBackend {
    response: String,
    failure: Option<String>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            response: "Mock response".to_string(),
            failure: None,
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the answer returned for every request.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Make every request fail with `Error::Inference(message)`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Requests seen so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
            });
        }
        match &self.failure {
            Some(message) => Err(Error::Inference(message.clone())),
            None => Ok(self.response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
