mod error;
mod orchestrator;
mod reactor;
mod state;

pub use error::PipelineError;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorConfig, SubmissionOutcome};
pub use reactor::{LanguageReactor, RefreshOutcome, SkipReason};
pub use state::{PipelineState, PipelineStatus};
