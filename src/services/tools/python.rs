use std::{process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use super::{parameters_schema, parse_arguments, Tool};
use crate::{config::Config, errors::AppResult};

pub const EMPTY_OUTPUT_HINT: &str =
    "Code executed successfully but produced no output. Did you forget to print the result?";

/// Executes agent-written code. Never fails: problems are reported in the
/// returned text so the agent can correct itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> String;
}

pub struct PythonRunner {
    python_bin: String,
    timeout: Duration,
}

impl PythonRunner {
    pub fn new(python_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python_bin: python_bin.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.python_bin.clone(),
            Duration::from_secs(config.python_timeout_secs),
        )
    }
}

#[async_trait]
impl CodeRunner for PythonRunner {
    async fn run(&self, code: &str) -> String {
        log::info!("Executing code:\n{}", code);

        let child = Command::new(&self.python_bin)
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                log::error!("Could not start {}: {}", self.python_bin, e);
                return format!("System error: could not start {}: {}", self.python_bin, e);
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return format!("System error: {}", e),
            Err(_) => {
                return format!(
                    "Error executing code: timed out after {} seconds",
                    self.timeout.as_secs()
                )
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        log::info!("Code output:\n{}", stdout);

        if !output.status.success() {
            let mut message = format!("Error executing code: {}", stderr.trim());
            if !stdout.trim().is_empty() {
                message.push_str(&format!("\nOutput before the error:\n{}", stdout));
            }
            return message;
        }
        if stdout.trim().is_empty() {
            return EMPTY_OUTPUT_HINT.to_string();
        }
        stdout
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunPythonArgs {
    /// Python source. Print the final result to stdout.
    pub code: String,
}

pub struct RunPythonTool {
    runner: Arc<dyn CodeRunner>,
}

impl RunPythonTool {
    pub fn new(runner: Arc<dyn CodeRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunPythonTool {
    fn name(&self) -> &'static str {
        "run_python_code"
    }

    fn description(&self) -> &'static str {
        "Run Python code (pandas, numpy, requests available if installed) and return what it prints. Use for downloads, data analysis and calculations."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<RunPythonArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: RunPythonArgs = parse_arguments(self.name(), arguments)?;
        Ok(self.runner.run(&args.code).await)
    }
}
