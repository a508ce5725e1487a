use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One quiz page the solver submitted an answer for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub url: String,
    pub session_id: String,
    /// How many times this URL had been loaded when the answer was submitted.
    pub attempt: u32,
    pub content_digest: String,
    pub page_excerpt: String,
    pub answer_payload: serde_json::Value,
    pub submit_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        self.url.to_lowercase().contains(needle_lowercase)
            || self.page_excerpt.to_lowercase().contains(needle_lowercase)
            || self
                .answer_payload
                .to_string()
                .to_lowercase()
                .contains(needle_lowercase)
    }
}

/// A chain of quiz pages started by one accepted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRun {
    pub run_id: String,
    pub email: String,
    pub start_url: String,
    pub status: RunStatus,
    pub tasks: Vec<TaskRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SolveRun {
    pub fn new(email: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            email: email.into(),
            start_url: start_url.into(),
            status: RunStatus::Pending,
            tasks: Vec::new(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}
