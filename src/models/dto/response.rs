use serde::Serialize;

pub const TASK_ACCEPTED_MESSAGE: &str = "Task received, solving started.";

#[derive(Debug, Serialize)]
pub struct TaskAcceptedResponse {
    pub message: String,
    pub run_id: String,
}

impl TaskAcceptedResponse {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            message: TASK_ACCEPTED_MESSAGE.to_string(),
            run_id: run_id.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
