//! Batch orchestration: one pass over every application, isolated per application.

pub mod driver;
pub mod outcome;
pub mod summary;

pub use driver::{PipelineDriver, PipelineSettings};
pub use outcome::{AppState, ApplicationResult, FetchOutcome};
pub use summary::{ApplicationSummary, RunSummary};
