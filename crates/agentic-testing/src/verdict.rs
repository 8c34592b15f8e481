//! Verdict extraction — pulls the pass/fail JSON object out of the agent's
//! free-text final answer.
//!
//! The agent is asked to answer with a single JSON object and nothing else,
//! but it is a free-text generator and often wraps the object in prose. The
//! extractor takes everything from the first `{` to the last `}` and decodes
//! it. It does not balance braces: an answer containing several JSON-like
//! objects, or literal braces in surrounding prose, yields a span that fails
//! to decode or decodes to the wrong object.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The agent's structured judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub test_case_passed: bool,
    #[serde(default)]
    pub explanation: String,
    /// Scenario-specific fields such as `final_page_url`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Verdict {
    pub fn final_page_url(&self) -> Option<&str> {
        self.extra.get("final_page_url").and_then(|v| v.as_str())
    }
}

/// Why no verdict could be extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerdictError {
    #[error("no JSON object in agent answer")]
    NoJson,

    #[error("malformed JSON in agent answer: {0}")]
    Malformed(String),

    #[error("verdict is missing boolean test_case_passed")]
    MissingPassedField,
}

/// The span from the first `{` to the last `}`, if the first precedes the last.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Extract and validate a verdict, reporting why extraction failed.
pub fn try_parse_verdict(text: &str) -> Result<Verdict, VerdictError> {
    let block = extract_json_block(text).ok_or(VerdictError::NoJson)?;
    let value: serde_json::Value =
        serde_json::from_str(block).map_err(|e| VerdictError::Malformed(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| VerdictError::Malformed("not a JSON object".into()))?;
    if !object
        .get("test_case_passed")
        .is_some_and(serde_json::Value::is_boolean)
    {
        return Err(VerdictError::MissingPassedField);
    }

    serde_json::from_value(value).map_err(|e| VerdictError::Malformed(e.to_string()))
}

/// Extract a verdict, or `None` when the answer carries no usable one.
pub fn parse_verdict(text: &str) -> Option<Verdict> {
    try_parse_verdict(text).ok()
}
