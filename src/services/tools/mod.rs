//! Functions the agent may call while working on a page.

pub mod api;
pub mod documents;
pub mod download;
pub mod history;
pub mod media;
pub mod page;
pub mod python;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    repositories::RunRepository,
    services::{browser_service::BrowserConfig, llm_client::ChatModel},
};

pub use python::{CodeRunner, PythonRunner};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    async fn call(&self, arguments: Value) -> AppResult<String>;
}

pub fn parameters_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

pub fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> AppResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| AppError::Tool(format!("invalid arguments for {}: {}", tool, e)))
}

/// Cut `output` to at most `limit` characters, noting how much was dropped.
pub fn truncate_output(output: String, limit: usize) -> String {
    let total = output.chars().count();
    if total <= limit {
        return output;
    }
    let mut truncated: String = output.chars().take(limit).collect();
    truncated.push_str(&format!("\n...[truncated {} characters]", total - limit));
    truncated
}

/// Directories local file references may point into.
#[derive(Debug, Clone, Default)]
pub struct LocalRoots(Vec<PathBuf>);

impl LocalRoots {
    /// Directories that do not exist are dropped.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self(
            dirs.into_iter()
                .filter_map(|dir| std::fs::canonicalize(dir).ok())
                .collect(),
        )
    }

    /// The screenshot directory and the system temp directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new([PathBuf::from(&config.screenshot_dir), std::env::temp_dir()])
    }

    fn allows(&self, path: &Path) -> bool {
        self.0.iter().any(|root| path.starts_with(root))
    }
}

/// Where a tool reads its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(String),
    Local(PathBuf),
}

impl Source {
    /// Accepts absolute http(s) URLs and existing files inside `roots`.
    /// Local paths are resolved before the check, so `..` and symlinks
    /// cannot leave the allowed directories.
    pub fn classify(reference: &str, roots: &LocalRoots) -> AppResult<Self> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Source::Remote(reference.to_string()));
        }
        let path = PathBuf::from(reference);
        if !path.is_file() {
            return Err(AppError::Tool(format!(
                "URL must be absolute. Received: {}",
                reference
            )));
        }
        let resolved = std::fs::canonicalize(&path)?;
        if !roots.allows(&resolved) {
            log::warn!("Refusing local file outside allowed directories: {}", reference);
            return Err(AppError::Tool(format!(
                "Local path is outside the allowed directories: {}",
                reference
            )));
        }
        Ok(Source::Local(resolved))
    }

    pub fn file_name(&self) -> Option<String> {
        let last = match self {
            Source::Remote(url) => url::Url::parse(url)
                .ok()?
                .path_segments()?
                .last()
                .map(str::to_string),
            Source::Local(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        };
        last.filter(|name| !name.is_empty())
    }

    /// Body bytes and, for remote sources, the reported content type.
    pub async fn fetch(&self, http: &reqwest::Client) -> AppResult<(Vec<u8>, Option<String>)> {
        match self {
            Source::Remote(url) => {
                log::info!("Downloading {}", url);
                let response = http.get(url).send().await?.error_for_status()?;
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await?;
                Ok((bytes.to_vec(), content_type))
            }
            Source::Local(path) => {
                log::info!("Reading local file {}", path.display());
                Ok((tokio::fs::read(path).await?, None))
            }
        }
    }
}

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    output_limit: usize,
}

impl ToolRegistry {
    pub fn new(output_limit: usize) -> Self {
        Self {
            tools: Vec::new(),
            output_limit,
        }
    }

    /// Every tool the quiz agent is offered.
    pub fn standard(
        config: &Config,
        http: reqwest::Client,
        vision_model: Arc<dyn ChatModel>,
        runner: Arc<dyn CodeRunner>,
        runs: Arc<dyn RunRepository>,
    ) -> Self {
        let roots = LocalRoots::from_config(config);
        let mut registry = Self::new(config.tool_output_limit);
        registry.register(Arc::new(download::DownloadFileTool::new(
            http.clone(),
            roots.clone(),
        )));
        registry.register(Arc::new(page::FetchPageTextTool::new(BrowserConfig::from_config(
            config,
        ))));
        registry.register(Arc::new(page::FetchPageScriptsTool::new(http.clone())));
        registry.register(Arc::new(media::TranscribeAudioTool::new(
            config,
            http.clone(),
            roots.clone(),
        )));
        registry.register(Arc::new(media::UnderstandImageTool::new(
            vision_model,
            http.clone(),
            roots.clone(),
        )));
        registry.register(Arc::new(documents::ReadPdfTool::new(http.clone(), roots.clone())));
        registry.register(Arc::new(documents::ReadZipTool::new(http.clone(), roots)));
        registry.register(Arc::new(api::CallApiTool::new(http)));
        registry.register(Arc::new(python::RunPythonTool::new(runner)));
        registry.register(Arc::new(history::SearchHistoryTool::new(runs)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool definitions in the chat-completions `tools` format.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }

    /// Run a tool by name. Failures come back as text for the model to read.
    pub async fn invoke(&self, name: &str, raw_arguments: &str) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            log::warn!("Agent requested unknown tool '{}'", name);
            return format!("Error: unknown tool '{}'", name);
        };

        let arguments = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(raw_arguments) {
                Ok(value) => value,
                Err(e) => {
                    return format!("Error: arguments for {} are not valid JSON: {}", name, e)
                }
            }
        };

        log::info!("Calling tool {} with {}", name, arguments);
        match tool.call(arguments).await {
            Ok(output) => {
                log::info!(
                    "Tool {} returned (first 200 chars): {}",
                    name,
                    output.chars().take(200).collect::<String>()
                );
                truncate_output(output, self.output_limit)
            }
            Err(e) => {
                log::error!("Tool {} failed: {}", name, e);
                format!("Error running {}: {}", name, e)
            }
        }
    }
}
