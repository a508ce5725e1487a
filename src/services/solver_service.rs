//! The quiz-solving loop: load a page, let the agent answer it, submit, and
//! follow the next URL the quiz server hands back.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    constants::prompts::{
        code_followup_prompt, task_prompt, TaskPromptInput, INVALID_JSON_PROMPT,
        MISSING_FIELDS_PROMPT,
    },
    errors::AppResult,
    models::domain::{redact_payload, AgentAnswer, PageContent, RunStatus, TaskRecord, REDACTED},
    repositories::RunRepository,
    services::{
        agent_service::QuizAgent,
        browser_service::{BrowserLauncher, PageDriver},
        extraction::{extract_page, resolve_url},
        response_parser::{parse_directive, AgentDirective, ParseError},
        submission_service::AnswerSubmitter,
        tools::CodeRunner,
    },
};

const PAGE_EXCERPT_CHARS: usize = 500;
const LOG_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub max_parse_retries: u32,
    pub max_url_attempts: u32,
    pub retry_delay: Duration,
    pub empty_page_delay: Duration,
    pub screenshot_dir: PathBuf,
    pub default_submit_url: Option<String>,
}

impl SolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_parse_retries: config.max_parse_retries,
            max_url_attempts: config.max_url_attempts,
            retry_delay: config.retry_delay(),
            empty_page_delay: Duration::from_secs(1),
            screenshot_dir: PathBuf::from(&config.screenshot_dir),
            default_submit_url: config.default_submit_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub run_id: String,
    pub start_url: String,
    pub email: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The server accepted an answer and sent no further URL.
    Completed { pages: usize },
    /// One URL was loaded `attempts` times without being solved.
    GaveUp { url: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageStep {
    Advance(String),
    Completed,
    Retry { reason: Option<String>, wait: bool },
}

struct PageContext<'a> {
    url: &'a str,
    session_id: &'a str,
    attempt: u32,
    digest: String,
    excerpt: String,
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// `text` with every occurrence of the shared secret masked.
fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

pub struct SolverService {
    settings: SolverSettings,
    launcher: Arc<dyn BrowserLauncher>,
    agent: Arc<dyn QuizAgent>,
    submitter: Arc<dyn AnswerSubmitter>,
    runner: Arc<dyn CodeRunner>,
    runs: Arc<dyn RunRepository>,
}

impl SolverService {
    pub fn new(
        settings: SolverSettings,
        launcher: Arc<dyn BrowserLauncher>,
        agent: Arc<dyn QuizAgent>,
        submitter: Arc<dyn AnswerSubmitter>,
        runner: Arc<dyn CodeRunner>,
        runs: Arc<dyn RunRepository>,
    ) -> Self {
        Self {
            settings,
            launcher,
            agent,
            submitter,
            runner,
            runs,
        }
    }

    /// Solve a whole run and record how it ended. Never returns an error:
    /// failures are logged and stored on the run.
    pub async fn solve(&self, request: SolveRequest) {
        log::info!(
            "Starting quiz solver workflow for {} (run {})",
            request.email,
            request.run_id
        );
        if let Err(e) = self.runs.mark_running(&request.run_id).await {
            log::warn!("Could not mark run {} as running: {}", request.run_id, e);
        }

        let result = match self.launcher.launch().await {
            Ok(driver) => {
                let result = self.run_loop(driver.as_ref(), &request).await;
                drop(driver);
                log::info!("Browser closed for run {}", request.run_id);
                result
            }
            Err(e) => Err(e),
        };

        let (status, error) = match result {
            Ok(RunOutcome::Completed { pages }) => {
                log::info!("Run {} completed after {} page(s)", request.run_id, pages);
                (RunStatus::Completed, None)
            }
            Ok(RunOutcome::GaveUp { url, attempts }) => {
                let message = format!("gave up on {} after {} attempts", url, attempts);
                log::error!("Run {} {}", request.run_id, message);
                (RunStatus::Failed, Some(message))
            }
            Err(e) => {
                log::error!("Error in solver loop: {}", e);
                (RunStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = self.runs.finish(&request.run_id, status, error).await {
            log::warn!("Could not record end of run {}: {}", request.run_id, e);
        }
    }

    pub async fn run_loop(
        &self,
        driver: &dyn PageDriver,
        request: &SolveRequest,
    ) -> AppResult<RunOutcome> {
        let mut current_url = request.start_url.clone();
        let mut attempts: u32 = 0;
        let mut pages: usize = 0;
        let mut last_digest: Option<String> = None;
        let mut last_reason: Option<String> = None;

        loop {
            attempts += 1;
            if attempts > self.settings.max_url_attempts {
                return Ok(RunOutcome::GaveUp {
                    url: current_url,
                    attempts: attempts - 1,
                });
            }

            // Fresh agent memory for every page load.
            let session_id = Uuid::new_v4().to_string();
            log::info!("Started new agent session for {}: {}", current_url, session_id);

            let page = self
                .load_page(driver, &current_url, &request.email, &session_id)
                .await?;
            let content = page.render();
            let digest = page.digest();
            let unchanged = last_digest.as_deref() == Some(digest.as_str());
            if unchanged {
                log::info!("Content of {} unchanged since last attempt", current_url);
            }

            let context = PageContext {
                url: &current_url,
                session_id: &session_id,
                attempt: attempts,
                digest: digest.clone(),
                excerpt: page.excerpt(PAGE_EXCERPT_CHARS),
            };
            let step = self
                .solve_page(request, &context, &content, unchanged, last_reason.as_deref())
                .await;
            self.agent.end_session(&session_id).await;

            match step? {
                PageStep::Advance(next_url) => {
                    pages += 1;
                    current_url = next_url;
                    attempts = 0;
                    last_digest = None;
                    last_reason = None;
                }
                PageStep::Completed => {
                    return Ok(RunOutcome::Completed { pages: pages + 1 });
                }
                PageStep::Retry { reason, wait } => {
                    last_digest = Some(digest);
                    last_reason = reason;
                    if wait {
                        log::info!(
                            "Retrying {} in {:?}",
                            current_url,
                            self.settings.retry_delay
                        );
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }
    }

    async fn load_page(
        &self,
        driver: &dyn PageDriver,
        url: &str,
        email: &str,
        session_id: &str,
    ) -> AppResult<PageContent> {
        log::info!("Navigating to {}", url);
        driver.open(url).await?;

        match driver.fill_email(email).await {
            Ok(true) => log::info!("Submitted email on {}", url),
            Ok(false) => {}
            Err(e) => log::warn!("Error handling email input: {}", e),
        }

        let html = driver.html().await?;
        let mut page = extract_page(&html, url);

        if page.text.trim().is_empty() {
            tokio::time::sleep(self.settings.empty_page_delay).await;
            match driver.inner_text().await {
                Ok(text) => page.text = text.trim().to_string(),
                Err(e) => log::warn!("Could not read body text: {}", e),
            }
        }

        match driver.has_visuals().await {
            Ok(true) => {
                let path = self
                    .settings
                    .screenshot_dir
                    .join(format!("screenshot_{}.jpg", session_id));
                match driver.screenshot_jpeg(&path).await {
                    Ok(()) => {
                        log::info!(
                            "Visual elements detected. Saved screenshot to {}",
                            path.display()
                        );
                        page.attach_screenshot(path.display().to_string());
                    }
                    Err(e) => log::warn!("Error handling screenshot: {}", e),
                }
            }
            Ok(false) => {
                log::info!("No significant visual elements detected. Skipping screenshot.")
            }
            Err(e) => log::warn!("Error checking for visual elements: {}", e),
        }

        log::info!(
            "Extracted content (first {} chars): {}",
            LOG_PREVIEW_CHARS,
            preview(&page.render(), LOG_PREVIEW_CHARS)
        );
        Ok(page)
    }

    async fn solve_page(
        &self,
        request: &SolveRequest,
        context: &PageContext<'_>,
        content: &str,
        unchanged: bool,
        previous_reason: Option<&str>,
    ) -> AppResult<PageStep> {
        let mut prompt = task_prompt(&TaskPromptInput {
            page_url: context.url,
            content,
            email: &request.email,
            secret: &request.secret,
            default_submit_url: self.settings.default_submit_url.as_deref(),
            content_unchanged: unchanged,
            previous_reason,
        });

        for attempt in 1..=self.settings.max_parse_retries {
            let reply = self.agent.run(&prompt, context.session_id).await?;
            log::info!(
                "LLM response (attempt {}): {}",
                attempt,
                redact_secret(&reply, &request.secret)
            );

            let parsed = match parse_directive(&reply) {
                Ok(AgentDirective::Submit(answer)) => Ok(answer),
                Ok(AgentDirective::RunPython(code)) => {
                    self.run_code_and_follow_up(request, context, &code).await?
                }
                Err(e) => Err(e),
            };

            match parsed {
                Ok(answer) => return Ok(self.submit(request, context, answer).await),
                Err(ParseError::InvalidJson(e)) => {
                    log::error!("Failed to parse agent response: {}", e);
                    prompt = INVALID_JSON_PROMPT.to_string();
                }
                Err(ParseError::MissingFields) => {
                    log::error!("Agent failed to provide answer_payload or submit_url");
                    prompt = MISSING_FIELDS_PROMPT.to_string();
                }
            }
        }

        log::warn!(
            "No usable answer for {} after {} attempts, reloading the page",
            context.url,
            self.settings.max_parse_retries
        );
        Ok(PageStep::Retry {
            reason: None,
            wait: false,
        })
    }

    async fn run_code_and_follow_up(
        &self,
        request: &SolveRequest,
        context: &PageContext<'_>,
        code: &str,
    ) -> AppResult<Result<AgentAnswer, ParseError>> {
        log::info!("Agent provided Python code to execute");
        let output = self.runner.run(code).await;
        log::info!("Python code executed, output: {}...", preview(&output, 200));

        let followup = code_followup_prompt(&output, &request.email, &request.secret, context.url);
        let reply = self.agent.run(&followup, context.session_id).await?;
        log::info!(
            "LLM follow-up response: {}",
            redact_secret(&reply, &request.secret)
        );

        Ok(match parse_directive(&reply) {
            Ok(AgentDirective::Submit(answer)) => Ok(answer),
            Ok(AgentDirective::RunPython(_)) => Err(ParseError::MissingFields),
            Err(e) => Err(e),
        })
    }

    async fn submit(
        &self,
        request: &SolveRequest,
        context: &PageContext<'_>,
        mut answer: AgentAnswer,
    ) -> PageStep {
        answer.fill_credentials(&request.email, &request.secret, context.url);
        let submit_url = resolve_url(context.url, &answer.submit_url);
        log::info!("Solved. Submitting to {}", submit_url);

        let outcome = self
            .submitter
            .submit(&submit_url, &answer.answer_payload)
            .await;
        log::info!(
            "Submission response: {}",
            serde_json::to_string(&outcome).unwrap_or_default()
        );

        let next_url = outcome.url.as_deref().map(|next| resolve_url(context.url, next));
        let record = TaskRecord {
            url: context.url.to_string(),
            session_id: context.session_id.to_string(),
            attempt: context.attempt,
            content_digest: context.digest.clone(),
            page_excerpt: context.excerpt.clone(),
            answer_payload: redact_payload(&answer.answer_payload),
            submit_url,
            reasoning: answer.reasoning,
            correct: outcome.correct,
            reason: outcome.reason.clone(),
            next_url: next_url.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.runs.append_task(&request.run_id, record).await {
            log::warn!("Could not record task for run {}: {}", request.run_id, e);
        }

        if let Some(next_url) = next_url {
            log::info!("Received next URL: {}", next_url);
            if outcome.correct {
                log::info!("Answer correct! Moving to next URL.");
            } else {
                log::warn!("Answer was incorrect, but moving to next URL as instructed.");
            }
            return PageStep::Advance(next_url);
        }

        if outcome.correct {
            log::info!("Answer correct! No new URL provided. Quiz completed!");
            return PageStep::Completed;
        }

        log::warn!(
            "Answer incorrect: {}",
            outcome.reason.as_deref().unwrap_or("no reason given")
        );
        PageStep::Retry {
            reason: outcome.reason,
            wait: true,
        }
    }
}
