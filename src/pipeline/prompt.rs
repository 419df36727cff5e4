//! Prompt synthesis: instruction + separator + extracted text.

use crate::error::PipelineError;
use crate::prompts::INSTRUCTION_SEPARATOR;
use std::fmt;

/// The exact text sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, which is what the size guard counts.
    pub fn len_chars(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the prompt for `text`.
///
/// The text is inserted verbatim, with no escaping or truncation. When
/// `max_chars` is set, a longer prompt is rejected instead of being cut.
pub fn build_prompt(
    instruction: &str,
    text: &str,
    max_chars: Option<usize>,
) -> Result<Prompt, PipelineError> {
    let prompt = Prompt(format!("{instruction}{INSTRUCTION_SEPARATOR}{text}"));
    if let Some(limit) = max_chars {
        let chars = prompt.len_chars();
        if chars > limit {
            return Err(PipelineError::PromptTooLarge { chars, limit });
        }
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::IDENTITY_INSTRUCTION;

    #[test]
    fn instruction_then_separator_then_text() {
        let p = build_prompt("Extract", "Jane Doe", None).unwrap();
        assert_eq!(p.as_str(), "Extract: Jane Doe");
    }

    #[test]
    fn empty_text_keeps_separator() {
        let p = build_prompt(IDENTITY_INSTRUCTION, "", None).unwrap();
        assert_eq!(p.as_str(), format!("{IDENTITY_INSTRUCTION}: "));
    }

    #[test]
    fn text_is_not_escaped() {
        let text = "{\"quoted\"}\n\tÄ";
        let p = build_prompt("I", text, None).unwrap();
        assert!(p.as_str().ends_with(text));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // "I: " + 4 two-byte chars = 7 chars, 11 bytes
        let p = build_prompt("I", "éééé", Some(7)).unwrap();
        assert_eq!(p.len_chars(), 7);
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        let err = build_prompt("I", "abcdef", Some(5)).unwrap_err();
        match err {
            PipelineError::PromptTooLarge { chars, limit } => {
                assert_eq!(chars, 9);
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
