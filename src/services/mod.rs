pub mod agent_service;
pub mod browser_service;
pub mod extraction;
pub mod llm_client;
pub mod response_parser;
pub mod solver_service;
pub mod submission_service;
pub mod tools;

pub use agent_service::{Agent, QuizAgent};
pub use solver_service::{SolveRequest, SolverService, SolverSettings};
