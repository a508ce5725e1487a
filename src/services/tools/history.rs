use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{parameters_schema, parse_arguments, Tool};
use crate::{errors::AppResult, models::domain::TaskRecord, repositories::RunRepository};

const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchHistoryArgs {
    /// Text to look for, typically a previous quiz URL
    pub query: String,
}

fn format_task(task: &TaskRecord) -> String {
    let mut lines = vec![
        format!("URL: {}", task.url),
        format!("Answer payload: {}", task.answer_payload),
        format!("Correct: {}", task.correct),
    ];
    if let Some(reason) = &task.reason {
        lines.push(format!("Reason: {}", reason));
    }
    if let Some(next) = &task.next_url {
        lines.push(format!("Next URL: {}", next));
    }
    lines.push(format!("Page excerpt: {}", task.page_excerpt));
    lines.join("\n")
}

/// Looks up pages already solved, so later tasks can refer back to them.
pub struct SearchHistoryTool {
    runs: Arc<dyn RunRepository>,
}

impl SearchHistoryTool {
    pub fn new(runs: Arc<dyn RunRepository>) -> Self {
        Self { runs }
    }
}

#[async_trait]
impl Tool for SearchHistoryTool {
    fn name(&self) -> &'static str {
        "search_history"
    }

    fn description(&self) -> &'static str {
        "Search previously solved quiz pages (URL, page text, submitted answer and result)."
    }

    fn parameters(&self) -> Value {
        parameters_schema::<SearchHistoryArgs>()
    }

    async fn call(&self, arguments: Value) -> AppResult<String> {
        let args: SearchHistoryArgs = parse_arguments(self.name(), arguments)?;
        let tasks = self.runs.search_tasks(&args.query, MAX_RESULTS).await?;

        if tasks.is_empty() {
            return Ok(format!("No previous tasks match '{}'", args.query));
        }
        Ok(tasks.iter().map(format_task).collect::<Vec<_>>().join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::domain::SolveRun, repositories::InMemoryRunRepository};
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn finds_recorded_tasks() {
        let repo = Arc::new(InMemoryRunRepository::new());
        let run = repo
            .create(SolveRun::new("a@example.com", "https://quiz.example.com/q1"))
            .await
            .unwrap();
        repo.append_task(
            &run.run_id,
            TaskRecord {
                url: "https://quiz.example.com/q1".to_string(),
                session_id: "s1".to_string(),
                attempt: 1,
                content_digest: "d".to_string(),
                page_excerpt: "Find the secret code".to_string(),
                answer_payload: json!({"answer": "alpha-7"}),
                submit_url: "https://quiz.example.com/submit".to_string(),
                reasoning: None,
                correct: false,
                reason: Some("Wrong code".to_string()),
                next_url: Some("https://quiz.example.com/q2".to_string()),
                recorded_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let tool = SearchHistoryTool::new(repo);
        let out = tool.call(json!({"query": "quiz.example.com/q1"})).await.unwrap();

        assert!(out.contains("URL: https://quiz.example.com/q1"));
        assert!(out.contains("alpha-7"));
        assert!(out.contains("Reason: Wrong code"));
        assert!(out.contains("Next URL: https://quiz.example.com/q2"));

        let none = tool.call(json!({"query": "zzz"})).await.unwrap();
        assert_eq!(none, "No previous tasks match 'zzz'");
    }
}
