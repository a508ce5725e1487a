#[cfg(test)]
pub mod fixtures {
    use std::sync::Arc;

    use crate::{
        app_state::AppState,
        config::Config,
        errors::AppError,
        models::domain::SolveRun,
        repositories::{InMemoryRunRepository, RunRepository},
        services::{
            agent_service::MockQuizAgent,
            browser_service::MockBrowserLauncher,
            solver_service::{SolverService, SolverSettings},
            submission_service::MockAnswerSubmitter,
            tools::python::MockCodeRunner,
        },
    };

    pub const TEST_EMAIL: &str = "student@example.com";
    pub const QUIZ_URL: &str = "https://quiz.example.com/quiz/q1";

    /// A quiz page with the usual mix of links and media.
    pub const QUIZ_HTML: &str = r#"<html>
<head><title>Q1</title><script>var answer = 42;</script></head>
<body>
  <h1>Question 1</h1>
  <p>Download <a href="/files/data.csv">the data</a> and sum the <b>value</b> column.</p>
  <audio src="clip.mp3"></audio>
  <img src="https://cdn.example.com/chart.png" alt="chart">
  <p>Post your answer to https://quiz.example.com/submit</p>
</body>
</html>"#;

    pub fn test_run() -> SolveRun {
        SolveRun::new(TEST_EMAIL, QUIZ_URL)
    }

    /// App state whose background solver cannot launch a browser, so every
    /// accepted run ends up failed without touching the network.
    pub fn test_state(config: Config) -> AppState {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_launch()
            .returning(|| Err(AppError::Browser("no browser in tests".to_string())));

        let runs: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
        let solver = SolverService::new(
            SolverSettings::from_config(&config),
            Arc::new(launcher),
            Arc::new(MockQuizAgent::new()),
            Arc::new(MockAnswerSubmitter::new()),
            Arc::new(MockCodeRunner::new()),
            Arc::clone(&runs),
        );

        AppState::from_parts(config, Arc::new(solver), runs)
    }
}

#[cfg(test)]
pub mod test_helpers {
    use actix_web::http::StatusCode;

    /// Asserts that a status code represents an error (4xx or 5xx)
    pub fn assert_error_status(status: StatusCode) {
        assert!(
            status.is_client_error() || status.is_server_error(),
            "Expected error status, got: {}",
            status
        );
    }

    /// Asserts that a status code represents success (2xx)
    pub fn assert_success_status(status: StatusCode) {
        assert!(
            status.is_success(),
            "Expected success status, got: {}",
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::test_helpers::*;
    use crate::{models::domain::RunStatus, services::extraction::extract_page};
    use actix_web::http::StatusCode;

    #[test]
    fn test_fixture_run_is_pending() {
        let run = test_run();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.email, TEST_EMAIL);
    }

    #[test]
    fn test_fixture_page_extracts_media() {
        let page = extract_page(QUIZ_HTML, QUIZ_URL);

        assert!(page.text.contains("Question 1"));
        assert!(!page.text.contains("var answer"));
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.audio.len(), 1);
        assert_eq!(page.images.len(), 1);
    }

    #[test]
    fn test_status_helpers() {
        assert_error_status(StatusCode::FORBIDDEN);
        assert_success_status(StatusCode::OK);
    }
}
