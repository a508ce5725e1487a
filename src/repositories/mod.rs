pub mod run_repository;

pub use run_repository::{InMemoryRunRepository, RunRepository};
