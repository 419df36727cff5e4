//! Model invocation: one prompt, one call, raw text back.
//!
//! There is no retry. A provider error, a timeout or an empty answer all
//! end the request with [`PipelineError::Invocation`].

use crate::error::PipelineError;
use crate::pipeline::prompt::Prompt;
use crate::services::llm::LanguageModel;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Send `prompt` to `model` and return its answer unchanged.
pub async fn invoke(
    model: &dyn LanguageModel,
    prompt: &Prompt,
    timeout: Duration,
) -> Result<String, PipelineError> {
    let start = Instant::now();
    let answer = match tokio::time::timeout(timeout, model.invoke(prompt.as_str())).await {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            warn!("model call failed: {}", e);
            return Err(PipelineError::Invocation(e.to_string()));
        }
        Err(_) => {
            return Err(PipelineError::Invocation(format!(
                "timed out after {}s",
                timeout.as_secs()
            )))
        }
    };
    if answer.trim().is_empty() {
        return Err(PipelineError::Invocation(
            "model returned an empty response".to_string(),
        ));
    }
    debug!(
        "model answered {} chars in {}ms",
        answer.len(),
        start.elapsed().as_millis()
    );
    Ok(answer)
}
