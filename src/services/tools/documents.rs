use std::io::{Cursor, Read};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, LocalRoots, Source, Tool};
use crate::errors::{AppError, AppResult};

/// Entries larger than this are listed but not inlined.
const MAX_ZIP_ENTRY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DocumentArgs {
    /// Absolute URL of the document or a local path
    pub url: String,
}

pub fn pdf_text(bytes: &[u8]) -> AppResult<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Tool(format!("could not read PDF: {}", e)))?;
    if text.trim().is_empty() {
        return Ok("The PDF contains no extractable text.".to_string());
    }
    Ok(text)
}

/// Lists every entry and inlines the ones that are UTF-8 text.
pub fn zip_summary(bytes: Vec<u8>) -> AppResult<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Tool(format!("could not open ZIP archive: {}", e)))?;

    let mut out = vec![format!("Archive contains {} entries", archive.len())];
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| AppError::Tool(format!("could not read ZIP entry {}: {}", index, e)))?;
        if entry.is_dir() {
            out.push(format!("=== {} (directory) ===", entry.name()));
            continue;
        }

        let name = entry.name().to_string();
        let size = entry.size();
        if size > MAX_ZIP_ENTRY_BYTES {
            out.push(format!("=== {} ({} bytes) ===\n(too large to inline)", name, size));
            continue;
        }

        let mut data = Vec::with_capacity(size as usize);
        entry.read_to_end(&mut data)?;
        let body = match String::from_utf8(data) {
            Ok(text) => text,
            Err(_) => "(binary content)".to_string(),
        };
        out.push(format!("=== {} ({} bytes) ===\n{}", name, size, body));
    }
    Ok(out.join("\n"))
}

pub struct ReadPdfTool {
    http: reqwest::Client,
    roots: LocalRoots,
}

impl ReadPdfTool {
    pub fn new(http: reqwest::Client, roots: LocalRoots) -> Self {
        Self { http, roots }
    }
}

#[async_trait]
impl Tool for ReadPdfTool {
    fn name(&self) -> &'static str {
        "read_pdf"
    }

    fn description(&self) -> &'static str {
        "Download a PDF and return its text content."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<DocumentArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: DocumentArgs = parse_arguments(self.name(), arguments)?;
        let (bytes, _) = Source::classify(&args.url, &self.roots)?.fetch(&self.http).await?;
        tokio::task::spawn_blocking(move || pdf_text(&bytes))
            .await
            .map_err(|e| AppError::Tool(format!("PDF task failed: {}", e)))?
    }
}

pub struct ReadZipTool {
    http: reqwest::Client,
    roots: LocalRoots,
}

impl ReadZipTool {
    pub fn new(http: reqwest::Client, roots: LocalRoots) -> Self {
        Self { http, roots }
    }
}

#[async_trait]
impl Tool for ReadZipTool {
    fn name(&self) -> &'static str {
        "read_zip"
    }

    fn description(&self) -> &'static str {
        "Download a ZIP archive, list its files and return the content of text files."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<DocumentArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: DocumentArgs = parse_arguments(self.name(), arguments)?;
        let (bytes, _) = Source::classify(&args.url, &self.roots)?.fetch(&self.http).await?;
        tokio::task::spawn_blocking(move || zip_summary(bytes))
            .await
            .map_err(|e| AppError::Tool(format!("ZIP task failed: {}", e)))?
    }
}
