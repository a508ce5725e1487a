use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, Tool};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CallApiArgs {
    /// Absolute URL of the API endpoint
    pub url: String,
    /// HTTP method, GET when omitted
    #[serde(default)]
    pub method: Option<String>,
    /// Extra request headers
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Request body; objects and arrays are sent as JSON, strings as-is
    #[serde(default)]
    pub body: Option<Value>,
}

pub fn parse_method(method: Option<&str>) -> AppResult<Method> {
    let method = method.map(str::trim).filter(|m| !m.is_empty()).unwrap_or("GET");
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| AppError::Tool(format!("unsupported HTTP method '{}'", method)))
}

pub struct CallApiTool {
    http: reqwest::Client,
}

impl CallApiTool {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for CallApiTool {
    fn name(&self) -> &'static str {
        "call_api"
    }

    fn description(&self) -> &'static str {
        "Make an HTTP request to an API the page explicitly tells you to call. Returns status and body."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<CallApiArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: CallApiArgs = parse_arguments(self.name(), arguments)?;
        let url = url::Url::parse(&args.url)
            .map_err(|e| AppError::Tool(format!("URL must be absolute ({}): {}", e, args.url)))?;
        let method = parse_method(args.method.as_deref())?;

        let mut request = self.http.request(method.clone(), url);
        for (name, value) in args.headers.unwrap_or_default() {
            request = request.header(name, value);
        }
        request = match args.body {
            None | Some(Value::Null) => request,
            Some(Value::String(text)) => request.body(text),
            Some(other) => request.json(&other),
        };

        log::info!("Calling API {} {}", method, args.url);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(format!("Status: {}\n{}", status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_defaults_to_get_and_is_case_insensitive() {
        assert_eq!(parse_method(None).unwrap(), Method::GET);
        assert_eq!(parse_method(Some(" post ")).unwrap(), Method::POST);
        assert_eq!(parse_method(Some("")).unwrap(), Method::GET);
        assert!(parse_method(Some("NOT A METHOD")).is_err());
    }

    #[test]
    fn arguments_accept_optional_fields() {
        let args: CallApiArgs = serde_json::from_value(json!({
            "url": "https://api.example.com/items",
            "headers": {"Accept": "application/json"},
            "body": {"q": 1}
        }))
        .unwrap();

        assert!(args.method.is_none());
        assert_eq!(args.headers.unwrap()["Accept"], "application/json");
        assert_eq!(args.body, Some(json!({"q": 1})));
    }

    #[tokio::test]
    async fn relative_url_is_rejected() {
        let tool = CallApiTool::new(reqwest::Client::new());
        let err = tool.call(json!({"url": "/api/items"})).await.unwrap_err();
        assert!(err.to_string().contains("URL must be absolute"));
    }
}
