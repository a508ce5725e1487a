use std::sync::Arc;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    repositories::{InMemoryRunRepository, RunRepository},
    services::{
        agent_service::Agent,
        browser_service::{BrowserConfig, ChromeLauncher},
        llm_client::OpenAiChatModel,
        solver_service::{SolverService, SolverSettings},
        submission_service::HttpSubmitter,
        tools::{CodeRunner, PythonRunner, ToolRegistry},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub solver: Arc<SolverService>,
    pub runs: Arc<dyn RunRepository>,
}

impl AppState {
    pub fn new(config: Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let runs: Arc<dyn RunRepository> = Arc::new(InMemoryRunRepository::new());
        let runner: Arc<dyn CodeRunner> = Arc::new(PythonRunner::from_config(&config));

        let chat_model = Arc::new(OpenAiChatModel::new(&config, config.llm_model.clone()));
        let vision_model = Arc::new(OpenAiChatModel::new(&config, config.llm_vision_model.clone()));
        log::info!(
            "Using model {} (vision: {}) at {}",
            chat_model.model(),
            vision_model.model(),
            config.llm_api_base
        );

        let tools = Arc::new(ToolRegistry::standard(
            &config,
            http.clone(),
            vision_model,
            Arc::clone(&runner),
            Arc::clone(&runs),
        ));
        log::info!("Agent tools: {}", tools.names().join(", "));

        let agent = Arc::new(Agent::new(chat_model, tools, config.max_tool_rounds));
        let solver = Arc::new(SolverService::new(
            SolverSettings::from_config(&config),
            Arc::new(ChromeLauncher::new(BrowserConfig::from_config(&config))),
            agent,
            Arc::new(HttpSubmitter::new(http)),
            runner,
            Arc::clone(&runs),
        ));

        Ok(Self::from_parts(config, solver, runs))
    }

    pub fn from_parts(config: Config, solver: Arc<SolverService>, runs: Arc<dyn RunRepository>) -> Self {
        Self {
            config: Arc::new(config),
            solver,
            runs,
        }
    }
}
