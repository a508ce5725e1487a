use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::multipart::{Form, Part};
use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, LocalRoots, Source, Tool};
use crate::{
    config::Config,
    errors::{AppError, AppResult},
    services::llm_client::{ChatMessage, ChatModel},
};

const DEFAULT_IMAGE_PROMPT: &str =
    "Describe this image in detail. Transcribe any text, numbers or codes exactly as shown.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranscribeAudioArgs {
    /// Absolute URL of the audio file (mp3, wav, ogg, ...) or a local path
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    text: String,
}

/// Speech to text through the `/audio/transcriptions` endpoint of the
/// configured OpenAI-compatible API.
pub struct TranscribeAudioTool {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    token: Option<SecretString>,
    roots: LocalRoots,
}

impl TranscribeAudioTool {
    pub fn new(config: &Config, http: reqwest::Client, roots: LocalRoots) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/audio/transcriptions",
                config.llm_api_base.trim_end_matches('/')
            ),
            model: config.llm_transcription_model.clone(),
            token: config.ai_token.clone(),
            roots,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Tool for TranscribeAudioTool {
    fn name(&self) -> &'static str {
        "transcribe_audio"
    }

    fn description(&self) -> &'static str {
        "Download an audio file and return a transcript of the speech in it."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<TranscribeAudioArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: TranscribeAudioArgs = parse_arguments(self.name(), arguments)?;
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| AppError::Configuration("AI_TOKEN is required for transcription".to_string()))?;

        let source = Source::classify(&args.url, &self.roots)?;
        let file_name = source.file_name().unwrap_or_else(|| "audio.mp3".to_string());
        let (bytes, _) = source.fetch(&self.http).await?;
        log::info!("Transcribing {} ({} bytes)", file_name, bytes.len());

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let transcription: Transcription = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.expose_secret())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        log::info!("Speech recognition output: {}", transcription.text);
        Ok(transcription.text)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UnderstandImageArgs {
    /// Absolute URL of the image or a local path such as /tmp/screenshot_<id>.jpg
    pub url: String,
    /// What to look for in the image; may be empty
    #[serde(default)]
    pub prompt: Option<String>,
}

pub fn image_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(ct) = content_type.filter(|ct| ct.starts_with("image/")) {
        return ct.split(';').next().unwrap_or(ct).trim().to_string();
    }
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
    .to_string()
}

/// Sends an image to the vision model as a base64 data URL.
pub struct UnderstandImageTool {
    model: Arc<dyn ChatModel>,
    http: reqwest::Client,
    roots: LocalRoots,
}

impl UnderstandImageTool {
    pub fn new(model: Arc<dyn ChatModel>, http: reqwest::Client, roots: LocalRoots) -> Self {
        Self { model, http, roots }
    }
}

#[async_trait]
impl Tool for UnderstandImageTool {
    fn name(&self) -> &'static str {
        "understand_image"
    }

    fn description(&self) -> &'static str {
        "Look at an image (URL or local screenshot path) and answer the prompt about it."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<UnderstandImageArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: UnderstandImageArgs = parse_arguments(self.name(), arguments)?;
        let source = Source::classify(&args.url, &self.roots)?;
        let (bytes, content_type) = source.fetch(&self.http).await?;
        let mime = image_mime(content_type.as_deref(), source.file_name().as_deref());
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(&bytes));

        let prompt = args
            .prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_PROMPT.to_string());

        let reply = self
            .model
            .complete(&[ChatMessage::user_with_image(prompt, data_url)], &[])
            .await?;

        reply
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Tool("vision model returned no description".to_string()))
    }
}
