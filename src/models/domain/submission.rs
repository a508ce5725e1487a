use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The final answer an agent produced for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer_payload: Value,
    pub submit_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl AgentAnswer {
    /// Insert `email`, `secret` and `url` into an object payload where the
    /// agent left them out. Values the agent did provide are kept.
    pub fn fill_credentials(&mut self, email: &str, secret: &str, url: &str) {
        if let Value::Object(map) = &mut self.answer_payload {
            for (key, value) in [("email", email), ("secret", secret), ("url", url)] {
                let missing = match map.get(key) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.trim().is_empty(),
                    Some(_) => false,
                };
                if missing {
                    map.insert(key.to_string(), Value::String(value.to_string()));
                }
            }
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Only a JSON `true` counts; null, strings and numbers are false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(matches!(value, Some(Value::Bool(true))))
}

/// Strings are kept as-is, any other non-null value is rendered as JSON.
fn reason_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

pub const REDACTED: &str = "[REDACTED]";

/// Copy of `payload` with the shared secret masked, for logs and stored
/// history.
pub fn redact_payload(payload: &Value) -> Value {
    let mut redacted = payload.clone();
    if let Some(secret) = redacted.get_mut("secret") {
        if !secret.is_null() {
            *secret = Value::String(REDACTED.to_string());
        }
    }
    redacted
}

/// The quiz server's reply to a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub correct: bool,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "reason_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SubmissionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            correct: false,
            url: None,
            reason: Some(reason.into()),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_treats_empty_url_as_absent() {
        let outcome: SubmissionOutcome =
            serde_json::from_value(json!({"correct": false, "url": "", "reason": "Wrong sum"}))
                .unwrap();

        assert!(!outcome.correct);
        assert!(outcome.url.is_none());
        assert_eq!(outcome.reason.as_deref(), Some("Wrong sum"));
    }

    #[test]
    fn outcome_keeps_unknown_fields_and_defaults_correct() {
        let outcome: SubmissionOutcome =
            serde_json::from_value(json!({"url": "https://quiz.example.com/q2", "delay": 12}))
                .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.url.as_deref(), Some("https://quiz.example.com/q2"));
        assert_eq!(outcome.extra.get("delay"), Some(&json!(12)));
    }

    #[test]
    fn outcome_tolerates_null_correct_and_keeps_url() {
        let outcome: SubmissionOutcome = serde_json::from_value(
            json!({"correct": null, "url": "https://quiz.example.com/q2"}),
        )
        .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.url.as_deref(), Some("https://quiz.example.com/q2"));
    }

    #[test]
    fn outcome_renders_structured_reason() {
        let outcome: SubmissionOutcome = serde_json::from_value(json!({
            "correct": "yes",
            "reason": {"detail": "bad"},
            "url": "https://quiz.example.com/q3"
        }))
        .unwrap();

        assert!(!outcome.correct);
        assert_eq!(outcome.reason.as_deref(), Some(r#"{"detail":"bad"}"#));
        assert_eq!(outcome.url.as_deref(), Some("https://quiz.example.com/q3"));
    }

    #[test]
    fn redact_payload_masks_only_the_secret() {
        let payload = json!({"email": "a@example.com", "secret": "s3cret", "answer": 1});
        let redacted = redact_payload(&payload);

        assert_eq!(redacted["secret"], REDACTED);
        assert_eq!(redacted["email"], "a@example.com");
        assert_eq!(redacted["answer"], 1);
        assert_eq!(payload["secret"], "s3cret");
        assert_eq!(redact_payload(&json!("42")), json!("42"));
    }

    #[test]
    fn outcome_null_url_is_absent() {
        let outcome: SubmissionOutcome =
            serde_json::from_value(json!({"correct": true, "url": null})).unwrap();
        assert!(outcome.correct);
        assert!(outcome.url.is_none());
    }

    #[test]
    fn fill_credentials_only_fills_missing_keys() {
        let mut answer = AgentAnswer {
            answer_payload: json!({"email": "agent@example.com", "secret": "", "answer": 12}),
            submit_url: "/submit".to_string(),
            reasoning: None,
        };

        answer.fill_credentials("me@example.com", "s3cret", "https://quiz.example.com/q1");

        assert_eq!(answer.answer_payload["email"], "agent@example.com");
        assert_eq!(answer.answer_payload["secret"], "s3cret");
        assert_eq!(answer.answer_payload["url"], "https://quiz.example.com/q1");
        assert_eq!(answer.answer_payload["answer"], 12);
    }

    #[test]
    fn fill_credentials_ignores_non_object_payloads() {
        let mut answer = AgentAnswer {
            answer_payload: json!("42"),
            submit_url: "/submit".to_string(),
            reasoning: None,
        };
        answer.fill_credentials("me@example.com", "s3cret", "https://quiz.example.com/q1");
        assert_eq!(answer.answer_payload, json!("42"));
    }
}
