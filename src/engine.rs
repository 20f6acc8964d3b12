use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::observe::{Level, WorkflowObserver};
use crate::stages::StageProcessor;
use crate::state_machine::{Direction, Phase, Stage, TaskState, TranslationTask};

/// Escalation port: fired once when a unit lands in a hard-failure state.
/// Fire-and-forget; the engine never consumes a return value.
pub trait Escalation: Send + Sync {
    fn flag_for_manual_review(&self, task: &TranslationTask, reason: &str);
}

/// Cancellation signal checked between stage invocations. A stage already
/// in flight always finishes deterministically first.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Retry pacing for transient assessor failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2u64.pow(attempt.saturating_sub(1).min(8))
    }
}

/// Aggregate outcome of an engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u32,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub unresolved: usize,
}

impl RunSummary {
    fn collect(tasks: &[TranslationTask], iterations: u32) -> Self {
        let completed = tasks
            .iter()
            .filter(|t| matches!(t.current_state, TaskState::Completed(_)))
            .count();
        let failed = tasks
            .iter()
            .filter(|t| {
                t.current_state.is_terminal()
                    && !matches!(t.current_state, TaskState::Completed(_))
            })
            .count();
        Self {
            iterations,
            total: tasks.len(),
            completed,
            failed,
            unresolved: tasks.len() - completed - failed,
        }
    }
}

const ENGINE: &str = "WorkflowEngine";
const PROJECT_MANAGER: &str = "ProjectManager";

/// The scheduling core: owns the state -> action dispatch, the retry and
/// revision bookkeeping, intake routing and the fixed-point run loop.
pub struct WorkflowEngine {
    processors: HashMap<Stage, Arc<dyn StageProcessor>>,
    escalation: Arc<dyn Escalation>,
    observer: Arc<dyn WorkflowObserver>,
    retry: RetryPolicy,
    revision_cap: u32,
    max_iterations: u32,
}

impl WorkflowEngine {
    pub fn new(
        processors: Vec<Arc<dyn StageProcessor>>,
        escalation: Arc<dyn Escalation>,
        observer: Arc<dyn WorkflowObserver>,
        retry: RetryPolicy,
        revision_cap: u32,
        max_iterations: u32,
    ) -> Self {
        let processors = processors.into_iter().map(|p| (p.stage(), p)).collect();
        Self {
            processors,
            escalation,
            observer,
            retry,
            revision_cap,
            max_iterations,
        }
    }

    /// Dispatch one unit exactly once. Returns true when its state changed.
    pub async fn step(&self, task: &mut TranslationTask) -> bool {
        let before = task.current_state;
        match before {
            TaskState::Uploaded => self.route_intake(task),
            TaskState::InStage {
                direction,
                stage,
                phase: Phase::Retry,
            } => self.handle_retry(task, direction, stage).await,
            TaskState::InStage {
                direction,
                stage,
                phase: Phase::Revision,
            } => self.handle_revision(task, direction, stage).await,
            TaskState::InStage {
                direction,
                stage,
                phase: Phase::Review,
            } => self.invoke(task, direction, stage, Phase::Review).await,
            _ => {} // terminal: never dispatched
        }

        let changed = task.current_state != before;
        if changed {
            self.observer.event(
                Some(&task.id),
                Level::Info,
                &format!("{before} -> {}", task.current_state),
            );
            self.after_transition(task);
        }
        changed
    }

    /// Map the locale pair to the first pending state, or reject the unit.
    fn route_intake(&self, task: &mut TranslationTask) {
        match task.direction() {
            Some(direction) => {
                task.transition(
                    TaskState::pending(direction, Stage::Translation),
                    PROJECT_MANAGER,
                    format!("Task {} routed to the {direction} workflow.", task.id),
                );
            }
            None => {
                let reason = format!(
                    "Unsupported language pair for task {}: {} to {}",
                    task.id, task.source_language, task.target_language
                );
                self.observer.event(Some(&task.id), Level::Error, &reason);
                task.transition(TaskState::ConfigurationError, PROJECT_MANAGER, reason);
            }
        }
    }

    /// Transient-failure bookkeeping: bump the shared counter, pace the
    /// retry, give up past the cap.
    async fn handle_retry(&self, task: &mut TranslationTask, direction: Direction, stage: Stage) {
        let step = format!("{} {stage:?}", direction.target_tag());
        let attempt = task.bump_retry(ENGINE, &step);
        if attempt < self.retry.max_retries {
            let delay_ms = self.retry.delay_for_attempt(attempt);
            self.observer.event(
                Some(&task.id),
                Level::Warn,
                &format!(
                    "retry {attempt}/{} for {step} (waiting {delay_ms}ms)",
                    self.retry.max_retries
                ),
            );
            sleep(Duration::from_millis(delay_ms)).await;
            task.transition(
                TaskState::pending(direction, stage),
                ENGINE,
                format!("Retrying {step} (attempt {attempt})."),
            );
        } else {
            task.transition(
                TaskState::MaxRetriesExceeded,
                ENGINE,
                format!("Max API retries for {step}."),
            );
        }
    }

    /// Revision bookkeeping: the requester already charged the counter; the
    /// dispatcher re-consults it as a guard before re-invoking the stage.
    async fn handle_revision(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        stage: Stage,
    ) {
        let stage_key = task
            .settings
            .last_revision_request_key
            .clone()
            .unwrap_or_else(|| stage.default_revision_key(direction));
        if task.revision_count(&stage_key) > self.revision_cap {
            task.transition(
                TaskState::MaxRevisionsExceeded,
                ENGINE,
                format!("Max revisions for stage key '{stage_key}'."),
            );
            return;
        }
        self.invoke(task, direction, stage, Phase::Revision).await;
    }

    async fn invoke(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        stage: Stage,
        phase: Phase,
    ) {
        let Some(processor) = self.processors.get(&stage) else {
            task.transition(
                TaskState::OnHold,
                ENGINE,
                format!("No processor bound for stage {stage:?}."),
            );
            return;
        };
        let processor = Arc::clone(processor);
        if let Err(err) = processor.process(task, direction, phase).await {
            // Unclassified failures never crash the run; they terminate the
            // unit with a full trail instead.
            self.observer.event(
                Some(&task.id),
                Level::Error,
                &format!("unexpected failure in {stage:?}: {err:#}"),
            );
            task.transition(
                TaskState::UnknownFailure,
                ENGINE,
                format!("Unexpected error during {stage:?} {phase:?}: {err}"),
            );
        }
    }

    fn after_transition(&self, task: &mut TranslationTask) {
        if task.current_state.is_hard_failure() {
            let reason = task
                .failure_reason
                .clone()
                .unwrap_or_else(|| task.current_state.to_string());
            task.note_escalation(PROJECT_MANAGER, &reason);
            self.escalation.flag_for_manual_review(task, &reason);
        }
    }

    /// Fixed-point scan: every iteration dispatches each non-terminal unit
    /// once; the run stops when an iteration changes nothing or the
    /// iteration cap is reached (the safety net against routing livelock).
    pub async fn run(&self, tasks: &mut [TranslationTask]) -> RunSummary {
        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut changed = false;
            for task in tasks.iter_mut() {
                if task.current_state.is_terminal() {
                    continue;
                }
                if self.step(task).await {
                    changed = true;
                }
            }
            if !changed || iterations >= self.max_iterations {
                break;
            }
        }
        let summary = RunSummary::collect(tasks, iterations);
        self.observer.event(
            None,
            Level::Info,
            &format!(
                "run finished after {iterations} iteration(s): {}/{} completed, {} failed, {} unresolved",
                summary.completed, summary.total, summary.failed, summary.unresolved
            ),
        );
        summary
    }

    /// Drive a single unit to a terminal state. Units are independent, so
    /// this needs no synchronization with other units.
    pub async fn drive(&self, task: &mut TranslationTask, cancel: Option<&CancelFlag>) {
        let mut steps = 0;
        while !task.current_state.is_terminal() && steps < self.max_iterations {
            if let Some(flag) = cancel
                && flag.is_cancelled()
            {
                task.transition(TaskState::Cancelled, ENGINE, "Cancelled by external signal.");
                return;
            }
            steps += 1;
            if !self.step(task).await {
                // A dispatch that changed nothing will never make progress.
                break;
            }
        }
    }

    /// One lightweight task per unit: each unit runs its own sequential
    /// loop to completion, sharing nothing mutable with the others.
    pub async fn run_concurrent(
        self: Arc<Self>,
        tasks: Vec<TranslationTask>,
        cancel: CancelFlag,
    ) -> Vec<TranslationTask> {
        let mut set = JoinSet::new();
        for mut task in tasks {
            let engine = Arc::clone(&self);
            let cancel = cancel.clone();
            set.spawn(async move {
                engine.drive(&mut task, Some(&cancel)).await;
                task
            });
        }

        let mut done = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(task) => done.push(task),
                Err(err) => self.observer.event(
                    None,
                    Level::Error,
                    &format!("unit task join error: {err}"),
                ),
            }
        }
        done.sort_by(|a, b| a.id.cmp(&b.id));
        done
    }
}
