//! Sequential stage executor with fail-fast short-circuiting.
//!
//! Stages run strictly in order. After each stage the termination predicate
//! decides whether the rest run at all. Because every stage passes a failed
//! state through unchanged, skipping them is only an optimization:
//! [`ExecutionMode::RunAll`] produces the same final state.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc::Sender;
use tracing::Instrument;

use super::stage::Stage;
use super::state::{should_end, PipelineState, PipelineStatus};
use crate::metrics::MetricsCollector;

/// Decides, after a stage, whether the run is over.
pub type TerminationPredicate = Arc<dyn Fn(&PipelineState) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Skip remaining stages once the predicate says the run is over.
    #[default]
    ShortCircuit,
    /// Invoke every stage regardless.
    RunAll,
}

/// Progress notifications for observers of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        stages: usize,
    },
    StageStarted {
        index: usize,
        stage: &'static str,
    },
    StageCompleted {
        index: usize,
        stage: &'static str,
        duration_ms: u64,
        errors: usize,
    },
    StageSkipped {
        index: usize,
        stage: &'static str,
    },
    Terminated {
        status: PipelineStatus,
    },
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Running { stage: &'static str },
    Terminated { status: PipelineStatus },
}

/// Which stages ran, which were skipped, and how the run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionTrace {
    pub executed: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    pub phase: RunPhase,
}

impl ExecutionTrace {
    fn new() -> Self {
        Self {
            executed: Vec::new(),
            skipped: Vec::new(),
            phase: RunPhase::Pending,
        }
    }
}

pub struct PipelineExecutor {
    stages: Vec<Arc<dyn Stage>>,
    mode: ExecutionMode,
    terminate: TerminationPredicate,
    events: Option<Sender<PipelineEvent>>,
    metrics: MetricsCollector,
}

impl PipelineExecutor {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            stages,
            mode: ExecutionMode::default(),
            terminate: Arc::new(should_end),
            events: None,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_termination<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PipelineState) -> bool + Send + Sync + 'static,
    {
        self.terminate = Arc::new(predicate);
        self
    }

    pub fn with_events(mut self, sender: Sender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, initial: PipelineState) -> PipelineState {
        self.run_traced(initial).await.0
    }

    pub async fn run_traced(&self, initial: PipelineState) -> (PipelineState, ExecutionTrace) {
        let mut trace = ExecutionTrace::new();
        let mut state = initial;
        let mut ended = false;

        self.emit(PipelineEvent::Started {
            stages: self.stages.len(),
        })
        .await;

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();

            if ended && self.mode == ExecutionMode::ShortCircuit {
                tracing::debug!(stage = name, "Skipping stage after termination");
                trace.skipped.push(name);
                self.emit(PipelineEvent::StageSkipped { index, stage: name })
                    .await;
                continue;
            }

            trace.phase = RunPhase::Running { stage: name };
            self.emit(PipelineEvent::StageStarted { index, stage: name })
                .await;

            let started = Instant::now();
            state = stage
                .run(state)
                .instrument(tracing::info_span!("stage", name = name, index = index))
                .await;
            let elapsed = started.elapsed();

            self.metrics.record_stage(name, elapsed.as_secs_f64());
            trace.executed.push(name);
            self.emit(PipelineEvent::StageCompleted {
                index,
                stage: name,
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                errors: state.errors.len(),
            })
            .await;

            ended = ended || (self.terminate)(&state);
        }

        let status = if state.has_errors() {
            PipelineStatus::Error
        } else {
            PipelineStatus::Success
        };
        trace.phase = RunPhase::Terminated { status };
        self.emit(PipelineEvent::Terminated { status }).await;

        tracing::debug!(
            status = status.as_str(),
            executed = trace.executed.len(),
            skipped = trace.skipped.len(),
            "Pipeline terminated"
        );

        (state, trace)
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Regulation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends a requirement, or fails when told to.
    struct Step {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Step {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Stage for Step {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, mut state: PipelineState) -> PipelineState {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if state.has_errors() {
                return state;
            }
            if self.fail {
                state.record_error(format!("{} failed: boom", self.name));
            } else {
                state.degraded.push(self.name.to_string());
            }
            state
        }
    }

    fn initial() -> PipelineState {
        PipelineState::new(Regulation::new("GDPR", "X", "Y"))
    }

    #[tokio::test]
    async fn test_runs_stages_in_order() {
        let executor = PipelineExecutor::new(vec![Step::new("a", false), Step::new("b", false)]);
        let (state, trace) = executor.run_traced(initial()).await;

        assert_eq!(state.degraded, vec!["a", "b"]);
        assert_eq!(trace.executed, vec!["a", "b"]);
        assert!(trace.skipped.is_empty());
        assert_eq!(
            trace.phase,
            RunPhase::Terminated {
                status: PipelineStatus::Success
            }
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_after_error() {
        let last = Step::new("c", false);
        let executor = PipelineExecutor::new(vec![
            Step::new("a", false),
            Step::new("b", true),
            last.clone(),
        ]);
        let (state, trace) = executor.run_traced(initial()).await;

        assert_eq!(state.errors, vec!["b failed: boom"]);
        assert_eq!(trace.skipped, vec!["c"]);
        assert_eq!(last.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            trace.phase,
            RunPhase::Terminated {
                status: PipelineStatus::Error
            }
        );
    }

    #[tokio::test]
    async fn test_run_all_matches_short_circuit() {
        let stages = || -> Vec<Arc<dyn Stage>> {
            vec![Step::new("a", false), Step::new("b", true), Step::new("c", false)]
        };

        let short = PipelineExecutor::new(stages()).run(initial()).await;
        let all = PipelineExecutor::new(stages())
            .with_mode(ExecutionMode::RunAll)
            .run(initial())
            .await;

        assert_eq!(short, all);
    }

    #[tokio::test]
    async fn test_custom_termination_predicate() {
        let executor = PipelineExecutor::new(vec![Step::new("a", false), Step::new("b", false)])
            .with_termination(|state| !state.degraded.is_empty());
        let (_, trace) = executor.run_traced(initial()).await;
        assert_eq!(trace.executed, vec!["a"]);
        assert_eq!(trace.skipped, vec!["b"]);
    }

    #[tokio::test]
    async fn test_emits_events() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let executor =
            PipelineExecutor::new(vec![Step::new("a", true), Step::new("b", false)]).with_events(tx);
        executor.run(initial()).await;
        drop(executor);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first(), Some(&PipelineEvent::Started { stages: 2 }));
        assert!(events.contains(&PipelineEvent::StageSkipped {
            index: 1,
            stage: "b"
        }));
        assert_eq!(
            events.last(),
            Some(&PipelineEvent::Terminated {
                status: PipelineStatus::Error
            })
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_input() {
        let (state, trace) = PipelineExecutor::new(vec![]).run_traced(initial()).await;
        assert_eq!(state, initial());
        assert!(trace.executed.is_empty());
    }
}
