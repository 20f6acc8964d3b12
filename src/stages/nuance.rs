use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::assessors::{assess_with_timeout, AssessContext, Assessor};
use crate::observe::{Level, WorkflowObserver};
use crate::router::RevisionRouter;
use crate::state_machine::{
    Direction, FeedbackRecord, Phase, Stage, TaskState, TranslationTask,
};

use super::{
    apply_suggestions, request_revision, revision_request_for, take_input, RevisionRequest,
    StageProcessor,
};

const APPROPRIATENESS_THRESHOLD: f64 = 0.7;

/// Identify the register of the source document. Published as an artifact so
/// the style editor and the final gate can reason about context without
/// re-deriving it.
pub(crate) fn identify_source_context(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    const CULTURAL: [&str; 9] = [
        "hockey",
        "poutine",
        "eh?",
        "dépanneur",
        "toque",
        "chum",
        "ringuette",
        "skidoo",
        "glorieux",
    ];
    const TECHNICAL: [&str; 7] = [
        "software",
        "system",
        "interface",
        "application",
        "framework",
        "database",
        "logiciel",
    ];
    const BUSINESS: [&str; 2] = ["le client veut", "rapport doit être impeccable"];

    if CULTURAL.iter().any(|term| lower.contains(term)) {
        "Identified context: Strong Canadian cultural references."
    } else if TECHNICAL.iter().any(|term| lower.contains(term)) {
        "Identified context: Technical/Software."
    } else if BUSINESS.iter().any(|term| lower.contains(term)) {
        "Identified context: Business/Formal."
    } else {
        "Identified context: General conversation."
    }
}

/// Nuance and context review: cultural-appropriateness scoring plus the
/// source-context analysis consumed downstream.
pub struct NuanceStage {
    assessor: Arc<dyn Assessor>,
    observer: Arc<dyn WorkflowObserver>,
    timeout: Duration,
    revision_cap: u32,
}

impl NuanceStage {
    pub fn new(
        assessor: Arc<dyn Assessor>,
        observer: Arc<dyn WorkflowObserver>,
        timeout: Duration,
        revision_cap: u32,
    ) -> Self {
        Self {
            assessor,
            observer,
            timeout,
            revision_cap,
        }
    }

    fn actor(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "FRCA_NuanceContextExpert",
            Direction::FrCaToEn => "ENCA_NuanceContextExpert",
        }
    }

    fn feedback_kind(direction: Direction, is_revision: bool) -> String {
        let base = match direction {
            Direction::EnToFrCa => "NuanceFRCA",
            Direction::FrCaToEn => "NuanceENCA",
        };
        if is_revision {
            format!("{base}_RevisionAttempt")
        } else {
            base.to_string()
        }
    }
}

#[async_trait]
impl StageProcessor for NuanceStage {
    fn stage(&self) -> Stage {
        Stage::Nuance
    }

    fn input_contract(&self, direction: Direction, phase: Phase) -> Vec<String> {
        let grammar = Stage::Grammar.output_key(direction);
        match phase {
            // When resolving a rework request the latest downstream artifact
            // is what the requester actually assessed.
            Phase::Revision => vec![
                Stage::Terminology.output_key(direction),
                Stage::Style.output_key(direction),
                Stage::Nuance.output_key(direction),
                format!("{grammar}_rev"),
                grammar,
            ],
            _ => vec![format!("{grammar}_rev"), grammar],
        }
    }

    async fn process(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        phase: Phase,
    ) -> Result<()> {
        let actor = Self::actor(direction);
        let is_revision = phase == Phase::Revision;
        let vacated = task.current_state;
        let step = format!(
            "{} nuance/context review{}",
            direction.target_code(),
            if is_revision { " (revision)" } else { "" }
        );

        let context = identify_source_context(&task.original_text);
        task.publish_version(
            &format!("source_context_analysis_{}", direction.target_code()),
            context,
            actor,
        );

        let keys = self.input_contract(direction, phase);
        let Some((input_key, input)) = take_input(task, &keys, actor, &step) else {
            return Ok(());
        };
        self.observer.event(
            Some(&task.id),
            Level::Info,
            &format!("{step} processing '{input_key}' ({context})"),
        );

        let working = if is_revision {
            match revision_request_for(task, vacated) {
                Some(request) => apply_suggestions(&input, &request.findings),
                None => input,
            }
        } else {
            input
        };

        let ctx = AssessContext::for_task(task, direction);
        let result =
            match assess_with_timeout(self.assessor.as_ref(), &working, &ctx, self.timeout).await {
                Ok(result) => result,
                Err(err) if err.is_transient() => {
                    task.transition(
                        TaskState::retry(direction, Stage::Nuance),
                        actor,
                        format!("transient assessor failure during {step}: {err}"),
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };
        task.reset_retry(actor, &step);

        let issues = result.blocking_findings();
        let issues_found = result.score < APPROPRIATENESS_THRESHOLD;

        let label = direction.target_label();
        let marker = if issues_found {
            format!(" [{label} Nuance Needs Review - Score: {:.2}]", result.score)
        } else {
            format!(
                " [{label} Nuance OK{}]",
                if is_revision { " (revised)" } else { "" }
            )
        };
        let mut output_key = Stage::Nuance.output_key(direction);
        if is_revision && !issues_found {
            output_key.push_str("_rev");
        }
        task.publish_version(&output_key, format!("{working}{marker}"), actor);

        let kind = Self::feedback_kind(direction, is_revision);
        let comment = format!(
            "API appropriateness score: {:.2}. Issues found: {issues_found}. Source context: {context}",
            result.score
        );

        if issues_found {
            request_revision(
                task,
                actor,
                Stage::Nuance,
                &kind,
                comment,
                issues,
                RevisionRequest {
                    target: TaskState::revision(direction, Stage::Grammar),
                    stage_key: Stage::Grammar.default_revision_key(direction),
                },
                self.revision_cap,
            );
        } else {
            task.log_feedback(FeedbackRecord::proceed(actor, Stage::Nuance, &kind, comment));
            let next = if is_revision {
                RevisionRouter::resolve(task, vacated, direction, Stage::Nuance)
            } else {
                TaskState::linear_next(direction, Stage::Nuance)
            };
            task.transition(next, actor, format!("{step} completed successfully."));
        }
        Ok(())
    }
}
