//! Staged compliance pipeline.
//!
//! A run threads one [`PipelineState`] through an ordered list of
//! [`Stage`]s. Each stage returns the whole state with its own slots filled
//! in. Failures are data: a stage that cannot do its work appends to
//! `errors`, every later stage passes such a state through untouched, and the
//! executor stops once [`should_end`] says the run is over.
//!
//! ```rust,ignore
//! use compliance_ai::pipeline::CompliancePipeline;
//!
//! let pipeline = CompliancePipeline::new(completer, store);
//! let outcome = pipeline.run(regulation).await;
//! if !outcome.is_success() {
//!     eprintln!("{:?}", outcome.errors);
//! }
//! ```

pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod stage;
pub mod state;

pub use config::{ConfigError, PipelineConfig};
pub use executor::{
    ExecutionMode, ExecutionTrace, PipelineEvent, PipelineExecutor, RunPhase, TerminationPredicate,
};
pub use orchestrator::{CompliancePipeline, PipelineError, PipelineStats};
pub use stage::Stage;
pub use state::{should_end, PipelineOutcome, PipelineState, PipelineStatus};
