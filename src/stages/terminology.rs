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

/// Terminology consistency check against the project term base. One checker
/// serves both directions; the assessor resolves the glossary from the call
/// context.
pub struct TerminologyStage {
    assessor: Arc<dyn Assessor>,
    observer: Arc<dyn WorkflowObserver>,
    timeout: Duration,
    revision_cap: u32,
    stale_marker: regex::Regex,
}

impl TerminologyStage {
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
            // A reworked artifact carries the previous verdict marker; it
            // must not survive into the re-stamped output.
            stale_marker: regex::Regex::new(r"\s?\[Terms(?:OK|Issue)[^\]]*\]")
                .expect("invalid terms marker pattern"),
        }
    }

    const ACTOR: &'static str = "TerminologyChecker";

    fn feedback_kind(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "TerminologyFRCA",
            Direction::FrCaToEn => "TerminologyENCA",
        }
    }
}

#[async_trait]
impl StageProcessor for TerminologyStage {
    fn stage(&self) -> Stage {
        Stage::Terminology
    }

    fn input_contract(&self, direction: Direction, _phase: Phase) -> Vec<String> {
        let style = Stage::Style.output_key(direction);
        vec![format!("{style}_rev"), style]
    }

    async fn process(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        phase: Phase,
    ) -> Result<()> {
        let is_revision = phase == Phase::Revision;
        let vacated = task.current_state;
        let step = format!("{} terminology review", direction.target_tag());

        let keys = self.input_contract(direction, phase);
        let Some((input_key, input)) = take_input(task, &keys, Self::ACTOR, &step) else {
            return Ok(());
        };
        self.observer.event(
            Some(&task.id),
            Level::Info,
            &format!("{step} processing '{input_key}'"),
        );

        let working = if is_revision {
            match revision_request_for(task, vacated) {
                Some(request) => apply_suggestions(&input, &request.findings),
                None => input,
            }
        } else {
            input
        };
        let working = self.stale_marker.replace_all(&working, "").into_owned();

        let ctx = AssessContext::for_task(task, direction);
        let result =
            match assess_with_timeout(self.assessor.as_ref(), &working, &ctx, self.timeout).await {
                Ok(result) => result,
                Err(err) if err.is_transient() => {
                    self.observer.event(
                        Some(&task.id),
                        Level::Warn,
                        &format!("transient failure during {step}: {err}"),
                    );
                    task.transition(
                        TaskState::retry(direction, Stage::Terminology),
                        Self::ACTOR,
                        format!("transient assessor failure during {step}: {err}"),
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };
        task.reset_retry(Self::ACTOR, &step);

        let critical = result.critical_findings();
        let terms_ok = critical.is_empty();

        let tag = direction.target_tag();
        let marker = if terms_ok {
            format!(" [TermsOK {tag}]")
        } else {
            format!(" [TermsIssue {tag} - {} critical]", critical.len())
        };
        task.publish_version(
            &Stage::Terminology.output_key(direction),
            format!("{working}{marker}"),
            Self::ACTOR,
        );

        let kind = Self::feedback_kind(direction);
        let comment = format!(
            "Terms OK: {terms_ok}. Issues found: {} (critical: {}). {}",
            result.findings.len(),
            critical.len(),
            result.notes
        );

        if terms_ok {
            task.log_feedback(FeedbackRecord::proceed(
                Self::ACTOR,
                Stage::Terminology,
                kind,
                comment,
            ));
            let next = if is_revision {
                RevisionRouter::resolve(task, vacated, direction, Stage::Terminology)
            } else {
                TaskState::linear_next(direction, Stage::Terminology)
            };
            task.transition(next, Self::ACTOR, format!("{step} completed successfully."));
        } else {
            request_revision(
                task,
                Self::ACTOR,
                Stage::Terminology,
                kind,
                comment,
                critical,
                RevisionRequest {
                    target: TaskState::revision(direction, Stage::Style),
                    stage_key: Stage::Style.default_revision_key(direction),
                },
                self.revision_cap,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessors::{AssessorError, StructuredResult, TerminologyAssessor};
    use crate::observe::NullObserver;
    use crate::state_machine::{RequestedAction, TaskSettings};

    fn stage() -> TerminologyStage {
        TerminologyStage::new(
            Arc::new(TerminologyAssessor::new()),
            Arc::new(NullObserver),
            Duration::from_secs(5),
            2,
        )
    }

    fn make_task(style_output: &str, project: &str) -> TranslationTask {
        let mut settings = TaskSettings::default();
        settings.project_code = project.to_string();
        let mut task = TranslationTask::new("t1", "source", "EN_CA", "FR_CA", settings);
        task.publish_version("style_tone_corrected_frca", style_output, "FRCA_StyleToneEditor");
        task.transition(
            TaskState::pending(Direction::EnToFrCa, Stage::Terminology),
            "FRCA_StyleToneEditor",
            "style done",
        );
        task
    }

    #[tokio::test]
    async fn consistent_terms_advance_to_final_review() {
        let mut task = make_task("Le logiciel est prêt. [FR-CA Style OK ('neutral_formal')]", "proj_alpha");
        stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::pending(Direction::EnToFrCa, Stage::FinalGate)
        );
        assert!(
            task.version("terminology_corrected_frca")
                .unwrap()
                .contains("[TermsOK FR_CA]")
        );
    }

    #[tokio::test]
    async fn untranslated_term_routes_to_style_revision() {
        let mut task = make_task("Le computer est prêt.", "proj_alpha");
        stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Style)
        );
        assert_eq!(task.revision_count("frca_style"), 1);
        let request = task.feedback.last().unwrap();
        assert_eq!(request.requested_action, RequestedAction::RevisionNeeded);
        assert_eq!(request.findings[0].suggestion.as_deref(), Some("ordinateur"));
        assert!(
            task.version("terminology_corrected_frca")
                .unwrap()
                .contains("[TermsIssue FR_CA - 1 critical]")
        );
    }

    #[tokio::test]
    async fn restamping_strips_the_previous_verdict_marker() {
        // A reworked style artifact still carries the old issue marker.
        let mut task = make_task(
            "Le ordinateur est prêt. [FR-CA Style OK ('neutral_formal')] [TermsIssue FR_CA - 1 critical]",
            "proj_alpha",
        );
        stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        let output = task.version("terminology_corrected_frca").unwrap();
        assert!(!output.contains("[TermsIssue"));
        assert!(output.contains("[TermsOK FR_CA]"));
    }

    #[tokio::test]
    async fn missing_termbase_is_a_transient_retry() {
        let mut task = make_task("Peu importe.", "proj_beta_nonexistent");
        stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::retry(Direction::EnToFrCa, Stage::Terminology)
        );
    }

    struct InternalFailure;

    #[async_trait]
    impl Assessor for InternalFailure {
        async fn assess(
            &self,
            _content: &str,
            _ctx: &AssessContext,
        ) -> Result<StructuredResult, AssessorError> {
            Err(AssessorError::Internal("glossary corrupted".to_string()))
        }
    }

    #[tokio::test]
    async fn internal_error_surfaces_to_the_engine() {
        let mut task = make_task("Peu importe.", "proj_alpha");
        let stage = TerminologyStage::new(
            Arc::new(InternalFailure),
            Arc::new(NullObserver),
            Duration::from_secs(5),
            2,
        );
        assert!(stage
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .is_err());
    }
}
