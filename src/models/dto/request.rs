use serde::Deserialize;
use validator::{Validate, ValidationError};

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("url").with_message("url must be an absolute http(s) URL".into())),
    }
}

/// Body of `POST /`. Fields beyond these three are accepted and ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuizRequestDto {
    #[validate(length(min = 1, message = "email must not be empty"))]
    pub email: String,

    pub secret: String,

    #[validate(custom(function = "validate_http_url"))]
    pub url: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
