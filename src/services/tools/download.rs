use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, LocalRoots, Source, Tool};
use crate::errors::AppResult;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadFileArgs {
    /// Absolute URL of the file, or a local path under the temp or screenshot directory
    pub url: String,
}

pub struct DownloadFileTool {
    http: reqwest::Client,
    roots: LocalRoots,
}

impl DownloadFileTool {
    pub fn new(http: reqwest::Client, roots: LocalRoots) -> Self {
        Self { http, roots }
    }
}

/// Text files come back as text; anything else as base64 with a short header.
pub fn describe_download(bytes: Vec<u8>, content_type: Option<&str>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            format!(
                "Binary file ({} bytes, content type: {}). Base64:\n{}",
                bytes.len(),
                content_type.unwrap_or("unknown"),
                STANDARD.encode(&bytes)
            )
        }
    }
}

#[async_trait]
impl Tool for DownloadFileTool {
    fn name(&self) -> &'static str {
        "download_file"
    }

    fn description(&self) -> &'static str {
        "Download a file. Text files (CSV, JSON, TXT) are returned as text, binary files as base64."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<DownloadFileArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: DownloadFileArgs = parse_arguments(self.name(), arguments)?;
        let source = Source::classify(&args.url, &self.roots)?;
        let (bytes, content_type) = source.fetch(&self.http).await?;
        Ok(describe_download(bytes, content_type.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn utf8_content_is_returned_verbatim() {
        let out = describe_download(b"id,value\n1,10\n".to_vec(), Some("text/csv"));
        assert_eq!(out, "id,value\n1,10\n");
    }

    #[test]
    fn binary_content_is_base64() {
        let out = describe_download(vec![0xff, 0x00, 0x10], Some("application/octet-stream"));
        assert!(out.starts_with("Binary file (3 bytes, content type: application/octet-stream)"));
        assert!(out.ends_with("/wAQ"));
    }

    #[tokio::test]
    async fn rejects_relative_reference() {
        let tool = DownloadFileTool::new(reqwest::Client::new(), LocalRoots::default());
        let err = tool.call(json!({"url": "data.csv"})).await.unwrap_err();
        assert!(err.to_string().contains("URL must be absolute"));
    }

    #[tokio::test]
    async fn refuses_to_read_env_file_outside_roots() {
        let allowed = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let env_file = project.path().join(".env");
        std::fs::write(&env_file, "AI_TOKEN=sk-live-123").unwrap();

        let tool = DownloadFileTool::new(reqwest::Client::new(), LocalRoots::new([allowed.path()]));
        let err = tool
            .call(json!({"url": env_file.to_string_lossy()}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("outside the allowed directories"));
        assert!(!err.to_string().contains("sk-live-123"));
    }

    #[tokio::test]
    async fn reads_files_inside_roots() {
        let allowed = tempfile::tempdir().unwrap();
        let data = allowed.path().join("data.csv");
        std::fs::write(&data, "id,value\n1,10\n").unwrap();

        let tool = DownloadFileTool::new(reqwest::Client::new(), LocalRoots::new([allowed.path()]));
        let out = tool.call(json!({"url": data.to_string_lossy()})).await.unwrap();

        assert_eq!(out, "id,value\n1,10\n");
    }
}
