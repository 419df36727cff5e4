//! Pipeline stages for structured extraction.
//!
//! Each submodule implements exactly one transformation step; the
//! orchestrator in [`crate::extractor`] runs them in order and stops at the
//! first failure.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ prompt ──▶ llm ──▶ project
//! (bytes)   (OCR/PDF)   (string)   (raw)   (schema)
//! ```
//!
//! 1. [`input`]: decode the inline payload or fetch the object by key
//! 2. [`extract`]: OCR an image or read every page of a PDF
//! 3. [`prompt`]: instruction + `": "` + text, with a size guard
//! 4. [`llm`]: one model call under a timeout
//! 5. [`project`]: parse the answer and project it onto the schema

pub mod extract;
pub mod input;
pub mod llm;
pub mod project;
pub mod prompt;

use crate::error::ErrorKind;
use std::fmt;

/// Where a request is in the pipeline.
///
/// ```text
/// Received → Acquiring → Extracting → Synthesizing → Invoking → Projecting → Done
///     └──────────┴────────────┴─────────────┴────────────┴───────────┴──▶ Failed(kind)
/// ```
///
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Acquiring,
    Extracting,
    Synthesizing,
    Invoking,
    Projecting,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    /// The stage after this one on the success path. Terminal stages stay put.
    pub fn advance(self) -> Stage {
        match self {
            Stage::Received => Stage::Acquiring,
            Stage::Acquiring => Stage::Extracting,
            Stage::Extracting => Stage::Synthesizing,
            Stage::Synthesizing => Stage::Invoking,
            Stage::Invoking => Stage::Projecting,
            Stage::Projecting => Stage::Done,
            terminal @ (Stage::Done | Stage::Failed(_)) => terminal,
        }
    }

    /// Move to `Failed(kind)`. Terminal stages stay put.
    pub fn fail(self, kind: ErrorKind) -> Stage {
        if self.is_terminal() {
            self
        } else {
            Stage::Failed(kind)
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => f.write_str("received"),
            Stage::Acquiring => f.write_str("acquiring"),
            Stage::Extracting => f.write_str("extracting"),
            Stage::Synthesizing => f.write_str("synthesizing"),
            Stage::Invoking => f.write_str("invoking"),
            Stage::Projecting => f.write_str("projecting"),
            Stage::Done => f.write_str("done"),
            Stage::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_visits_every_stage() {
        let mut stage = Stage::Received;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = stage.advance();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Received,
                Stage::Acquiring,
                Stage::Extracting,
                Stage::Synthesizing,
                Stage::Invoking,
                Stage::Projecting,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn any_stage_can_fail() {
        let s = Stage::Invoking.fail(ErrorKind::Invocation);
        assert_eq!(s, Stage::Failed(ErrorKind::Invocation));
        assert!(s.is_terminal());
    }

    #[test]
    fn terminal_stages_are_sticky() {
        let failed = Stage::Failed(ErrorKind::Decode);
        assert_eq!(failed.advance(), failed);
        assert_eq!(failed.fail(ErrorKind::Extraction), failed);
        assert_eq!(Stage::Done.fail(ErrorKind::Invocation), Stage::Done);
        assert_eq!(Stage::Done.advance(), Stage::Done);
    }

    #[test]
    fn display_includes_failure_kind() {
        assert_eq!(
            Stage::Failed(ErrorKind::StorageFetch).to_string(),
            "failed(storage_fetch)"
        );
    }
}
