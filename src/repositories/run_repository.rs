use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{RunStatus, SolveRun, TaskRecord},
};

#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create(&self, run: SolveRun) -> AppResult<SolveRun>;
    async fn get(&self, run_id: &str) -> AppResult<Option<SolveRun>>;
    async fn mark_running(&self, run_id: &str) -> AppResult<()>;
    async fn append_task(&self, run_id: &str, task: TaskRecord) -> AppResult<()>;
    async fn finish(&self, run_id: &str, status: RunStatus, error: Option<String>) -> AppResult<()>;
    /// Most recent tasks first, across all runs.
    async fn search_tasks(&self, query: &str, limit: usize) -> AppResult<Vec<TaskRecord>>;
}

/// Process-local run store. Runs are kept for the lifetime of the server.
#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<String, SolveRun>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(run_id: &str) -> AppError {
    AppError::NotFound(format!("Run with id '{}' not found", run_id))
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create(&self, run: SolveRun) -> AppResult<SolveRun> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.run_id) {
            return Err(AppError::ValidationError(format!(
                "Run '{}' already exists",
                run.run_id
            )));
        }
        runs.insert(run.run_id.clone(), run.clone());
        Ok(run)
    }

    async fn get(&self, run_id: &str) -> AppResult<Option<SolveRun>> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }

    async fn mark_running(&self, run_id: &str) -> AppResult<()> {
        let mut runs = self.runs.write().await;
        let run = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;

        if run.status != RunStatus::Pending {
            return Err(AppError::ValidationError(format!(
                "Run is already {}",
                run.status
            )));
        }
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        Ok(())
    }

    async fn append_task(&self, run_id: &str, task: TaskRecord) -> AppResult<()> {
        let mut runs = self.runs.write().await;
        let run = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        run.tasks.push(task);
        Ok(())
    }

    async fn finish(&self, run_id: &str, status: RunStatus, error: Option<String>) -> AppResult<()> {
        if !status.is_terminal() {
            return Err(AppError::ValidationError(format!(
                "Cannot finish a run as {}",
                status
            )));
        }

        let mut runs = self.runs.write().await;
        let run = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        if run.status != RunStatus::Running {
            return Err(AppError::ValidationError("Run is not running".to_string()));
        }
        run.status = status;
        run.error_message = error;
        run.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn search_tasks(&self, query: &str, limit: usize) -> AppResult<Vec<TaskRecord>> {
        let needle = query.trim().to_lowercase();
        let runs = self.runs.read().await;

        let mut matches: Vec<TaskRecord> = runs
            .values()
            .flat_map(|run| run.tasks.iter())
            .filter(|task| needle.is_empty() || task.matches(&needle))
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        matches.truncate(limit);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn task(url: &str, minutes_ago: i64) -> TaskRecord {
        TaskRecord {
            url: url.to_string(),
            session_id: "s".to_string(),
            attempt: 1,
            content_digest: "d".to_string(),
            page_excerpt: "excerpt".to_string(),
            answer_payload: json!({"answer": "x"}),
            submit_url: "https://quiz.example.com/submit".to_string(),
            reasoning: None,
            correct: true,
            reason: None,
            next_url: None,
            recorded_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn lifecycle_moves_pending_running_completed() {
        let repo = InMemoryRunRepository::new();
        let run = repo
            .create(SolveRun::new("a@example.com", "https://quiz.example.com/q1"))
            .await
            .unwrap();

        repo.mark_running(&run.run_id).await.unwrap();
        repo.finish(&run.run_id, RunStatus::Completed, None).await.unwrap();

        let stored = repo.get(&run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert!(stored.started_at.is_some());
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn finish_requires_running_and_terminal_status() {
        let repo = InMemoryRunRepository::new();
        let run = repo
            .create(SolveRun::new("a@example.com", "https://quiz.example.com/q1"))
            .await
            .unwrap();

        assert!(repo.finish(&run.run_id, RunStatus::Failed, None).await.is_err());
        repo.mark_running(&run.run_id).await.unwrap();
        assert!(repo.finish(&run.run_id, RunStatus::Running, None).await.is_err());
        assert!(repo.mark_running(&run.run_id).await.is_err());
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let repo = InMemoryRunRepository::new();

        assert!(repo.get("missing").await.unwrap().is_none());
        assert!(matches!(
            repo.mark_running("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_returns_newest_matches_first() {
        let repo = InMemoryRunRepository::new();
        let run = repo
            .create(SolveRun::new("a@example.com", "https://quiz.example.com/q1"))
            .await
            .unwrap();

        repo.append_task(&run.run_id, task("https://quiz.example.com/demo-audio", 10))
            .await
            .unwrap();
        repo.append_task(&run.run_id, task("https://quiz.example.com/demo-scrape", 5))
            .await
            .unwrap();
        repo.append_task(&run.run_id, task("https://quiz.example.com/demo-pdf", 1))
            .await
            .unwrap();

        let found = repo.search_tasks("DEMO", 2).await.unwrap();
        let urls: Vec<&str> = found.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://quiz.example.com/demo-pdf",
                "https://quiz.example.com/demo-scrape"
            ]
        );

        let audio = repo.search_tasks("audio", 10).await.unwrap();
        assert_eq!(audio.len(), 1);
    }
}
