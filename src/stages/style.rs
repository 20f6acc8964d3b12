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

const TONE_THRESHOLD: f64 = 0.75;

/// Style and tone editing. The target style comes from the task settings,
/// with one contextual override: technical source material is always edited
/// toward a formal register.
pub struct StyleStage {
    assessor: Arc<dyn Assessor>,
    observer: Arc<dyn WorkflowObserver>,
    timeout: Duration,
    revision_cap: u32,
}

impl StyleStage {
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
            Direction::EnToFrCa => "FRCA_StyleToneEditor",
            Direction::FrCaToEn => "ENCA_StyleToneEditor",
        }
    }

    fn feedback_kind(direction: Direction, is_revision: bool) -> String {
        let base = match direction {
            Direction::EnToFrCa => "StyleToneFRCA",
            Direction::FrCaToEn => "StyleToneENCA",
        };
        if is_revision {
            format!("{base}_RevisionAttempt")
        } else {
            base.to_string()
        }
    }
}

#[async_trait]
impl StageProcessor for StyleStage {
    fn stage(&self) -> Stage {
        Stage::Style
    }

    fn input_contract(&self, direction: Direction, phase: Phase) -> Vec<String> {
        let nuance = Stage::Nuance.output_key(direction);
        match phase {
            // A gate-requested rework targets the artifact the gate saw.
            Phase::Revision => {
                let terminology = Stage::Terminology.output_key(direction);
                vec![
                    format!("{terminology}_rev"),
                    terminology,
                    format!("{nuance}_rev"),
                    nuance,
                ]
            }
            _ => vec![format!("{nuance}_rev"), nuance],
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
            "{} style/tone edit{}",
            direction.target_code(),
            if is_revision { " (revision)" } else { "" }
        );

        let keys = self.input_contract(direction, phase);
        let Some((input_key, input)) = take_input(task, &keys, actor, &step) else {
            return Ok(());
        };

        let source_context = task
            .version(&format!("source_context_analysis_{}", direction.target_code()))
            .unwrap_or("Context: Unknown")
            .to_string();

        let mut target_style = task.settings.target_style.clone();
        if source_context.contains("Technical/Software") && target_style == "neutral_informal" {
            target_style = "neutral_formal".to_string();
        }
        self.observer.event(
            Some(&task.id),
            Level::Info,
            &format!("{step} processing '{input_key}' toward '{target_style}'"),
        );

        let working = if is_revision {
            match revision_request_for(task, vacated) {
                Some(request) => apply_suggestions(&input, &request.findings),
                None => input,
            }
        } else {
            input
        };

        let mut ctx = AssessContext::for_task(task, direction);
        ctx.target_style = target_style.clone();
        let result =
            match assess_with_timeout(self.assessor.as_ref(), &working, &ctx, self.timeout).await {
                Ok(result) => result,
                Err(err) if err.is_transient() => {
                    task.transition(
                        TaskState::retry(direction, Stage::Style),
                        actor,
                        format!("transient assessor failure during {step}: {err}"),
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };
        task.reset_retry(actor, &step);

        let issues = result.blocking_findings();
        let issues_found = result.score < TONE_THRESHOLD;

        let label = direction.target_label();
        let marker = format!(
            " [{label} Style {} ('{target_style}'){}]",
            if issues_found { "NeedsImprovement" } else { "OK" },
            if is_revision { " (revised)" } else { "" }
        );
        let mut output_key = Stage::Style.output_key(direction);
        if is_revision && !issues_found {
            output_key.push_str("_rev");
        }
        task.publish_version(&output_key, format!("{working}{marker}"), actor);

        let kind = Self::feedback_kind(direction, is_revision);
        let comment = format!(
            "API tone match score (for '{target_style}' given '{source_context}'): {:.2}. Issues: {issues_found}.",
            result.score
        );

        if issues_found {
            request_revision(
                task,
                actor,
                Stage::Style,
                &kind,
                comment,
                issues,
                RevisionRequest {
                    target: TaskState::revision(direction, Stage::Nuance),
                    stage_key: Stage::Nuance.default_revision_key(direction),
                },
                self.revision_cap,
            );
        } else {
            task.log_feedback(FeedbackRecord::proceed(actor, Stage::Style, &kind, comment));
            let next = if is_revision {
                RevisionRouter::resolve(task, vacated, direction, Stage::Style)
            } else {
                TaskState::linear_next(direction, Stage::Style)
            };
            task.transition(next, actor, format!("{step} completed successfully."));
        }
        Ok(())
    }
}
