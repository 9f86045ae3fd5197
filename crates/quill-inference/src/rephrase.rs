//! Rephrasing of note content with a generation backend.

use std::time::Instant;

use tracing::{debug, warn};

use quill_core::{Error, GenerationBackend, Result};

/// System prompt used for rephrasing.
pub const REPHRASE_SYSTEM_PROMPT: &str = "You are an editor for personal notes. \
Rewrite the note the user sends so it reads more clearly and fluently. \
Keep the original meaning, language and tone. \
The note is HTML produced by a rich-text editor: keep its structure \
(paragraphs, lists, headings, emphasis) and return only the rewritten HTML \
with no commentary.";

/// Rephrase `content` and return the cleaned answer.
///
/// An answer that is empty after cleaning is an `Error::Inference`.
pub async fn rephrase(backend: &dyn GenerationBackend, content: &str) -> Result<String> {
    let start = Instant::now();
    let raw = backend
        .generate_with_system(REPHRASE_SYSTEM_PROMPT, content)
        .await?;
    let cleaned = clean_generated_text(&raw);

    if cleaned.is_empty() {
        warn!(
            subsystem = "inference",
            component = "rephrase",
            model = backend.model_name(),
            "Backend returned an empty rephrasing"
        );
        return Err(Error::Inference(
            "Model returned an empty response".to_string(),
        ));
    }

    debug!(
        subsystem = "inference",
        component = "rephrase",
        op = "rephrase",
        model = backend.model_name(),
        prompt_len = content.len(),
        response_len = cleaned.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Rephrased note content"
    );
    Ok(cleaned)
}

/// Strip whitespace and a surrounding Markdown code fence.
///
/// Models often wrap HTML answers in ```` ```html ... ``` ````.
pub fn clean_generated_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. "html") on the opening fence line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}
