use async_trait::async_trait;
use serde_json::Value;

use crate::models::domain::{redact_payload, SubmissionOutcome};

/// Posts an answer to the quiz server. Transport errors become a failed
/// outcome rather than an error, so the solve loop can keep going.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit(&self, submit_url: &str, payload: &Value) -> SubmissionOutcome;
}

pub struct HttpSubmitter {
    http: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post(&self, submit_url: &str, payload: &Value) -> Result<SubmissionOutcome, reqwest::Error> {
        self.http
            .post(submit_url)
            .json(payload)
            .send()
            .await?
            .json::<SubmissionOutcome>()
            .await
    }
}

#[async_trait]
impl AnswerSubmitter for HttpSubmitter {
    async fn submit(&self, submit_url: &str, payload: &Value) -> SubmissionOutcome {
        let logged = redact_payload(payload);
        log::info!(
            "Submitting answer to {} with payload: {}",
            submit_url,
            serde_json::to_string_pretty(&logged).unwrap_or_else(|_| logged.to_string())
        );

        match self.post(submit_url, payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Submission failed: {}", e);
                SubmissionOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unreachable_server_yields_failed_outcome() {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let submitter = HttpSubmitter::new(http);

        // Port 9 (discard) on localhost is not listening in test environments.
        let outcome = submitter
            .submit("http://127.0.0.1:9/submit", &json!({"answer": 1}))
            .await;

        assert!(!outcome.correct);
        assert!(outcome.url.is_none());
        assert!(outcome.reason.is_some());
    }
}
