use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, Tool};
use crate::{
    errors::{AppError, AppResult},
    services::{
        browser_service::{BrowserConfig, BrowserSession, PageDriver},
        extraction::{extract_page, extract_scripts},
    },
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PageUrlArgs {
    /// Absolute http(s) URL of the page
    pub url: String,
}

fn require_absolute(url: &str) -> AppResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::Tool(format!("URL must be absolute. Received: {}", url)))
    }
}

/// Renders a page in a fresh browser, so scripted content is included.
pub struct FetchPageTextTool {
    browser: BrowserConfig,
}

impl FetchPageTextTool {
    pub fn new(browser: BrowserConfig) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for FetchPageTextTool {
    fn name(&self) -> &'static str {
        "fetch_page_text"
    }

    fn description(&self) -> &'static str {
        "Load a web page in a headless browser and return its visible text plus links and media."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<PageUrlArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: PageUrlArgs = parse_arguments(self.name(), arguments)?;
        require_absolute(&args.url)?;

        let session = BrowserSession::launch(self.browser.clone()).await?;
        session.open(&args.url).await?;
        let html = session.html().await?;
        drop(session);

        Ok(extract_page(&html, &args.url).render())
    }
}

pub struct FetchPageScriptsTool {
    http: reqwest::Client,
}

impl FetchPageScriptsTool {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for FetchPageScriptsTool {
    fn name(&self) -> &'static str {
        "fetch_page_scripts"
    }

    fn description(&self) -> &'static str {
        "Return the JavaScript embedded in or linked from a page. Only use when the page asks you to run or read its scripts."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<PageUrlArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: PageUrlArgs = parse_arguments(self.name(), arguments)?;
        require_absolute(&args.url)?;

        let html = self
            .http
            .get(&args.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let scripts = extract_scripts(&html, &args.url);

        let mut sections = Vec::new();
        for (index, body) in scripts.inline.iter().enumerate() {
            sections.push(format!("=== inline script #{} ===\n{}", index + 1, body));
        }
        for src in &scripts.external {
            let body = match self.http.get(src).send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("Error reading script: {}", e)),
                Err(e) => format!("Error downloading script: {}", e),
            };
            sections.push(format!("=== {} ===\n{}", src, body));
        }

        if sections.is_empty() {
            return Ok("No scripts found on the page.".to_string());
        }
        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absolute_check() {
        assert!(require_absolute("https://quiz.example.com/").is_ok());
        assert!(require_absolute("/quiz").is_err());
    }

    #[tokio::test]
    async fn page_text_rejects_relative_url_without_launching() {
        let tool = FetchPageTextTool::new(BrowserConfig::default());
        let err = tool.call(json!({"url": "q2"})).await.unwrap_err();
        assert!(err.to_string().contains("URL must be absolute"));
    }

    #[tokio::test]
    async fn scripts_rejects_relative_url() {
        let tool = FetchPageScriptsTool::new(reqwest::Client::new());
        assert!(tool.call(json!({"url": "q2"})).await.is_err());
    }
}
