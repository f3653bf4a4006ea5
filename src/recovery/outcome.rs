use serde_json::{Map, Value};
use thiserror::Error;

use crate::recovery::extract::extract_json_object;
use crate::recovery::segment::{TranscriptSegment, TranscriptSet};

/// Accepted keys for a segment's text, in lookup order.
const TEXT_KEYS: &[&str] = &["transcribed_text", "text"];

/// Final result handed back by one agent run, before any decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAgentResult {
    /// Free text, possibly JSON wrapped in prose or code fences.
    Text(String),
    /// A value the agent runtime already decoded.
    Structured(Value),
}

impl RawAgentResult {
    /// The raw result as text, exactly as received for `Text`.
    pub fn to_raw_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// No parseable JSON payload, even after brace extraction.
    #[error("decode_error: {0}")]
    Decode(String),
    /// JSON parsed but does not have the transcript shape.
    #[error("schema_error: {0}")]
    Schema(String),
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Schema(_) => "schema_error",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Decode(detail) | Self::Schema(detail) => detail,
        }
    }
}

/// Exactly one of these is produced per agent run.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Success(TranscriptSet),
    Failure { reason: FailureReason, raw: String },
}

impl RecoveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Turn one raw agent result into a validated transcript or a tagged failure.
///
/// Never panics and never returns an error: malformed model output always
/// resolves to `RecoveryOutcome::Failure` carrying the untouched raw text.
pub fn recover(raw: RawAgentResult) -> RecoveryOutcome {
    let (value, raw_text) = match raw {
        RawAgentResult::Structured(value) => {
            let raw_text = value.to_string();
            (value, raw_text)
        }
        RawAgentResult::Text(text) => match decode_text(&text) {
            Ok(value) => (value, text),
            Err(reason) => return RecoveryOutcome::Failure { reason, raw: text },
        },
    };

    match validate(&value) {
        Ok(set) => RecoveryOutcome::Success(set),
        Err(detail) => RecoveryOutcome::Failure {
            reason: FailureReason::Schema(detail),
            raw: raw_text,
        },
    }
}

fn decode_text(text: &str) -> Result<Value, FailureReason> {
    let direct_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            tracing::debug!("Agent result decoded directly as JSON");
            return Ok(value);
        }
        Err(e) => e,
    };

    let candidate = extract_json_object(text).ok_or_else(|| {
        FailureReason::Decode(format!(
            "not valid JSON ({direct_err}) and no {{...}} span found"
        ))
    })?;

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => {
            tracing::debug!(
                "Recovered JSON payload via brace extraction ({} of {} bytes)",
                candidate.len(),
                text.len()
            );
            Ok(value)
        }
        Err(e) => Err(FailureReason::Decode(format!(
            "extracted {{...}} span is not valid JSON: {e}"
        ))),
    }
}

/// Explicit shape check against `{"transcriptions": [{timestamp, transcribed_text}]}`.
fn validate(value: &Value) -> Result<TranscriptSet, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("expected an object, found {}", kind(value)))?;

    let items = object
        .get("transcriptions")
        .ok_or_else(|| "missing `transcriptions` field".to_string())?;
    let items = items
        .as_array()
        .ok_or_else(|| format!("`transcriptions` is {}, expected an array", kind(items)))?;

    let mut segments = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let entry = item.as_object().ok_or_else(|| {
            format!("transcriptions[{index}] is {}, expected an object", kind(item))
        })?;
        let timestamp = required_text(entry, index, &["timestamp"])?;
        let text = required_text(entry, index, TEXT_KEYS)?;
        segments.push(TranscriptSegment::new(timestamp, text));
    }

    Ok(TranscriptSet::new(segments))
}

fn required_text<'a>(
    entry: &'a Map<String, Value>,
    index: usize,
    keys: &[&str],
) -> Result<&'a str, String> {
    let (key, value) = keys
        .iter()
        .find_map(|key| entry.get(*key).map(|value| (*key, value)))
        .ok_or_else(|| format!("transcriptions[{index}] is missing `{}`", keys[0]))?;

    let text = value.as_str().ok_or_else(|| {
        format!(
            "transcriptions[{index}].{key} is {}, expected a string",
            kind(value)
        )
    })?;

    if text.is_empty() {
        return Err(format!("transcriptions[{index}].{key} is empty"));
    }
    Ok(text)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
