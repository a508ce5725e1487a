use std::{env, str::FromStr, time::Duration};

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug)]
pub struct Config {
    pub web_server_host: String,
    pub web_server_port: u16,
    pub quiz_secret: Option<SecretString>,
    pub ai_token: Option<SecretString>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub llm_vision_model: String,
    pub llm_transcription_model: String,
    pub default_submit_url: Option<String>,
    pub browser_headless: bool,
    pub browser_timeout_secs: u64,
    pub browser_user_agent: Option<String>,
    pub screenshot_dir: String,
    pub max_parse_retries: u32,
    pub max_url_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_tool_rounds: u32,
    pub python_bin: String,
    pub python_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub tool_output_limit: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Self {
            web_server_host: env::var("WEB_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_server_port: env_or("WEB_SERVER_PORT", 8080),
            quiz_secret: env_opt("QUIZ_SECRET").map(SecretString::from),
            ai_token: env_opt("AI_TOKEN").map(SecretString::from),
            llm_api_base: env::var("LLM_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_vision_model: env::var("LLM_VISION_MODEL").unwrap_or_else(|_| llm_model.clone()),
            llm_model,
            llm_transcription_model: env::var("LLM_TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            default_submit_url: env_opt("DEFAULT_SUBMIT_URL"),
            browser_headless: env_or("BROWSER_HEADLESS", true),
            browser_timeout_secs: env_or("BROWSER_TIMEOUT_SECS", 30),
            browser_user_agent: env_opt("BROWSER_USER_AGENT"),
            screenshot_dir: env::var("SCREENSHOT_DIR").unwrap_or_else(|_| "/tmp".to_string()),
            max_parse_retries: env_or("MAX_PARSE_RETRIES", 3),
            max_url_attempts: env_or("MAX_URL_ATTEMPTS", 5),
            retry_delay_secs: env_or("RETRY_DELAY_SECS", 2),
            max_tool_rounds: env_or("MAX_TOOL_ROUNDS", 12),
            python_bin: env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
            python_timeout_secs: env_or("PYTHON_TIMEOUT_SECS", 120),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 60),
            tool_output_limit: env_or("TOOL_OUTPUT_LIMIT", 20_000),
        }
    }

    /// Reject settings the solver cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_parse_retries == 0 {
            return Err(AppError::ValidationError(
                "MAX_PARSE_RETRIES must be at least 1".to_string(),
            ));
        }
        if self.max_url_attempts == 0 {
            return Err(AppError::ValidationError(
                "MAX_URL_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.max_tool_rounds == 0 {
            return Err(AppError::ValidationError(
                "MAX_TOOL_ROUNDS must be at least 1".to_string(),
            ));
        }
        if self.browser_timeout_secs == 0
            || self.python_timeout_secs == 0
            || self.http_timeout_secs == 0
        {
            return Err(AppError::ValidationError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.tool_output_limit == 0 {
            return Err(AppError::ValidationError(
                "TOOL_OUTPUT_LIMIT must be greater than zero".to_string(),
            ));
        }
        url::Url::parse(&self.llm_api_base).map_err(|e| {
            AppError::ValidationError(format!("LLM_API_BASE is not a valid URL: {}", e))
        })?;

        if self.quiz_secret.is_none() {
            log::warn!("QUIZ_SECRET not set. Incoming requests will not be authenticated.");
        }
        if self.ai_token.is_none() {
            log::warn!("AI_TOKEN not set. Every agent call will fail until it is provided.");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            quiz_secret: Some(SecretString::from("test-secret".to_string())),
            ai_token: Some(SecretString::from("test-token".to_string())),
            llm_api_base: "http://127.0.0.1:9/v1".to_string(),
            llm_model: "test-model".to_string(),
            llm_vision_model: "test-vision-model".to_string(),
            llm_transcription_model: "test-whisper".to_string(),
            default_submit_url: None,
            browser_headless: true,
            browser_timeout_secs: 5,
            browser_user_agent: None,
            screenshot_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            max_parse_retries: 3,
            max_url_attempts: 3,
            retry_delay_secs: 0,
            max_tool_rounds: 4,
            python_bin: "python3".to_string(),
            python_timeout_secs: 10,
            http_timeout_secs: 5,
            tool_output_limit: 2_000,
        }
    }
}
