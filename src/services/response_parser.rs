use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::models::domain::AgentAnswer;

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON_BLOCK is a valid regex pattern"));

/// What the agent asked the solver to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDirective {
    Submit(AgentAnswer),
    RunPython(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("reply is not a JSON object: {0}")]
    InvalidJson(String),

    #[error("reply is missing answer_payload or submit_url")]
    MissingFields,
}

/// The span from the first `{` to the last `}`, or the whole text when
/// there is no such span. Tolerates prose and code fences around the JSON.
pub fn extract_json_block(text: &str) -> &str {
    JSON_BLOCK.find(text).map(|m| m.as_str()).unwrap_or(text)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn parse_directive(text: &str) -> Result<AgentDirective, ParseError> {
    let block = extract_json_block(text);
    let value: Value =
        serde_json::from_str(block).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(ParseError::InvalidJson("top-level value is not an object".to_string()));
    };

    if !object.contains_key("answer_payload") {
        if let Some(code) = object.get("python_code").and_then(Value::as_str) {
            return Ok(AgentDirective::RunPython(code.to_string()));
        }
    }

    let answer_payload = object
        .get("answer_payload")
        .filter(|v| !is_blank(v))
        .cloned()
        .ok_or(ParseError::MissingFields)?;
    let submit_url = object
        .get("submit_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingFields)?
        .to_string();
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(AgentDirective::Submit(AgentAnswer {
        answer_payload,
        submit_url,
        reasoning,
    }))
}
