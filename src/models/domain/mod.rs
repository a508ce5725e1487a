pub mod page;
pub mod run;
pub mod submission;
pub use page::PageContent;
pub use run::{RunStatus, SolveRun, TaskRecord};
pub use submission::{redact_payload, AgentAnswer, SubmissionOutcome, REDACTED};
