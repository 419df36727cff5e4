//! Response projection: model text in, schema-shaped result out.
//!
//! ## Rules
//!
//! 1. **Fence stripping**: models often wrap JSON in a ```` ```json ```` block
//!    despite being told not to. One outer fence is removed.
//! 2. **Object required**: anything that is not a JSON object after
//!    stripping is a [`PipelineError::ResponseParse`].
//! 3. **Projection**: each declared field is looked up by exact key. Missing
//!    keys and `null` become [`crate::schema::NOT_PROVIDED`]; strings pass through
//!    unchanged; other values are kept as their compact JSON text.
//!    Undeclared keys are dropped.

use crate::error::PipelineError;
use crate::schema::{Schema, StructuredResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n?(.*?)\n?```\s*$").unwrap());

/// Remove one surrounding Markdown code fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

/// Parse `raw` as a JSON object and project it onto `schema`.
pub fn project(raw: &str, schema: &Schema) -> Result<StructuredResult, PipelineError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| PipelineError::ResponseParse(e.to_string()))?;
    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(PipelineError::ResponseParse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };
    let result = project_object(&object, schema);
    debug!(
        "Projected onto {} schema ({} of {} fields missing)",
        schema.name(),
        result.missing_count(),
        result.len()
    );
    Ok(result)
}

fn project_object(object: &Map<String, Value>, schema: &Schema) -> StructuredResult {
    StructuredResult::from_lookup(schema, |field| object.get(field).and_then(field_text))
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
