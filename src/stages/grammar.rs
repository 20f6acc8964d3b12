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

/// Grammar review. Anglicisms, regional term preferences and grammar
/// patterns block the unit and send the draft back to the translator.
pub struct GrammarStage {
    frca: Arc<dyn Assessor>,
    enca: Arc<dyn Assessor>,
    observer: Arc<dyn WorkflowObserver>,
    timeout: Duration,
    revision_cap: u32,
}

impl GrammarStage {
    pub fn new(
        frca: Arc<dyn Assessor>,
        enca: Arc<dyn Assessor>,
        observer: Arc<dyn WorkflowObserver>,
        timeout: Duration,
        revision_cap: u32,
    ) -> Self {
        Self {
            frca,
            enca,
            observer,
            timeout,
            revision_cap,
        }
    }

    fn actor(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "FRCA_GrammarSpecialist",
            Direction::FrCaToEn => "ENCA_GrammarSpecialist",
        }
    }

    fn feedback_kind(direction: Direction, is_revision: bool) -> String {
        let base = match direction {
            Direction::EnToFrCa => "GrammarFRCA",
            Direction::FrCaToEn => "GrammarENCA",
        };
        if is_revision {
            format!("{base}_RevisionAttempt")
        } else {
            base.to_string()
        }
    }
}

#[async_trait]
impl StageProcessor for GrammarStage {
    fn stage(&self) -> Stage {
        Stage::Grammar
    }

    fn input_contract(&self, direction: Direction, _phase: Phase) -> Vec<String> {
        let draft = Stage::Translation.output_key(direction);
        vec![format!("{draft}_rev"), draft]
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
            "{} grammar review{}",
            direction.target_code(),
            if is_revision { " (revision)" } else { "" }
        );

        let keys = self.input_contract(direction, phase);
        let Some((input_key, input)) = take_input(task, &keys, actor, &step) else {
            return Ok(());
        };
        self.observer.event(
            Some(&task.id),
            Level::Info,
            &format!("{step} processing '{input_key}'"),
        );

        // A rework pass first applies what the requester asked for, then
        // re-checks the corrected text.
        let working = if is_revision {
            match revision_request_for(task, vacated) {
                Some(request) => apply_suggestions(&input, &request.findings),
                None => input,
            }
        } else {
            input
        };

        let ctx = AssessContext::for_task(task, direction);
        let assessor = match direction {
            Direction::EnToFrCa => &self.frca,
            Direction::FrCaToEn => &self.enca,
        };
        let result = match assess_with_timeout(assessor.as_ref(), &working, &ctx, self.timeout)
            .await
        {
            Ok(result) => result,
            Err(err) if err.is_transient() => {
                self.observer.event(
                    Some(&task.id),
                    Level::Warn,
                    &format!("transient failure during {step}: {err}"),
                );
                task.transition(
                    TaskState::retry(direction, Stage::Grammar),
                    actor,
                    format!("transient assessor failure during {step}: {err}"),
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        task.reset_retry(actor, &step);

        let issues = result.blocking_findings();
        let language = match direction {
            Direction::EnToFrCa => "FR",
            Direction::FrCaToEn => "EN",
        };
        let marker = format!(
            " [{language} Grammar {}{}]",
            if issues.is_empty() { "OK" } else { "IssuesFound" },
            if is_revision { " (revised)" } else { "" }
        );
        let mut output_key = Stage::Grammar.output_key(direction);
        if is_revision && issues.is_empty() {
            output_key.push_str("_rev");
        }
        task.publish_version(&output_key, format!("{working}{marker}"), actor);

        let kind = Self::feedback_kind(direction, is_revision);
        let comment = format!(
            "API score: {:.2}, issues found: {}. {}",
            result.score,
            issues.len(),
            result.notes
        );

        if issues.is_empty() {
            task.log_feedback(FeedbackRecord::proceed(actor, Stage::Grammar, &kind, comment));
            let next = if is_revision {
                RevisionRouter::resolve(task, vacated, direction, Stage::Grammar)
            } else {
                TaskState::linear_next(direction, Stage::Grammar)
            };
            task.transition(next, actor, format!("{step} completed successfully."));
        } else {
            request_revision(
                task,
                actor,
                Stage::Grammar,
                &kind,
                comment,
                issues,
                RevisionRequest {
                    target: TaskState::revision(direction, Stage::Translation),
                    stage_key: Stage::Translation.default_revision_key(direction),
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
    use crate::assessors::{
        AssessorError, CaEnglishGrammarAssessor, CaFrenchGrammarAssessor, Severity,
        StructuredResult,
    };
    use crate::observe::NullObserver;
    use crate::state_machine::{RequestedAction, TaskSettings};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of assessor outcomes.
    struct SequenceAssessor {
        script: Mutex<VecDeque<Result<StructuredResult, AssessorError>>>,
    }

    impl SequenceAssessor {
        fn new(script: Vec<Result<StructuredResult, AssessorError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl Assessor for SequenceAssessor {
        async fn assess(
            &self,
            _content: &str,
            _ctx: &AssessContext,
        ) -> Result<StructuredResult, AssessorError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StructuredResult::clean(1.0, "exhausted script")))
        }
    }

    fn rule_stage() -> GrammarStage {
        GrammarStage::new(
            Arc::new(CaFrenchGrammarAssessor::new()),
            Arc::new(CaEnglishGrammarAssessor::new()),
            Arc::new(NullObserver),
            Duration::from_secs(5),
            2,
        )
    }

    fn scripted_stage(script: Vec<Result<StructuredResult, AssessorError>>) -> GrammarStage {
        let scripted = Arc::new(SequenceAssessor::new(script));
        GrammarStage::new(
            scripted.clone(),
            scripted,
            Arc::new(NullObserver),
            Duration::from_secs(5),
            2,
        )
    }

    fn make_task(draft: &str) -> TranslationTask {
        let mut task = TranslationTask::new(
            "t1",
            "Check the weather.",
            "EN_CA",
            "FR_CA",
            TaskSettings::default(),
        );
        task.publish_version("initial_translation_frca", draft, "EN_FRCA_InitialTranslator");
        task.transition(
            TaskState::pending(Direction::EnToFrCa, Stage::Grammar),
            "EN_FRCA_InitialTranslator",
            "draft ready",
        );
        task
    }

    #[tokio::test]
    async fn clean_draft_advances_to_nuance() {
        let mut task = make_task("Le rapport est impeccable.");
        rule_stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::pending(Direction::EnToFrCa, Stage::Nuance)
        );
        assert!(
            task.version("grammar_corrected_frca")
                .unwrap()
                .contains("[FR Grammar OK]")
        );
        assert_eq!(
            task.feedback.last().unwrap().requested_action,
            RequestedAction::Proceed
        );
    }

    #[tokio::test]
    async fn anglicisms_route_back_to_translation() {
        let mut task = make_task("Il faut checker ça.");
        rule_stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Translation)
        );
        assert_eq!(task.revision_count("en_frca_initial_translation"), 1);
        let request = task.feedback.last().unwrap();
        assert_eq!(request.requested_action, RequestedAction::RevisionNeeded);
        assert_eq!(request.findings[0].term, "checker");
    }

    #[tokio::test]
    async fn transient_failure_moves_to_retry_without_touching_revisions() {
        let mut task = make_task("Peu importe.");
        let stage = scripted_stage(vec![Err(AssessorError::ServiceUnavailable(
            "down".to_string(),
        ))]);
        stage
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::retry(Direction::EnToFrCa, Stage::Grammar)
        );
        assert!(task.revision_counts.is_empty());
    }

    #[tokio::test]
    async fn internal_error_surfaces_to_the_engine() {
        let mut task = make_task("Peu importe.");
        let stage = scripted_stage(vec![Err(AssessorError::Internal("boom".to_string()))]);
        let outcome = stage
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn revision_pass_applies_fixes_and_resolves_via_router() {
        let mut task = make_task("Texte corrigé.");
        // A nuance-stage complaint routed the unit into grammar revision.
        let revision_state = TaskState::revision(Direction::EnToFrCa, Stage::Grammar);
        task.log_feedback(FeedbackRecord::revision(
            "FRCA_NuanceContextExpert",
            Stage::Nuance,
            "NuanceFRCA",
            "register slip".to_string(),
            revision_state,
            vec![crate::assessors::Finding::new(
                "register",
                "trop cool",
                Some("très intéressant".to_string()),
                Severity::Low,
            )],
        ));
        task.publish_version(
            "initial_translation_frca",
            "Ce logiciel est trop cool.",
            "EN_FRCA_InitialTranslator",
        );
        task.transition(revision_state, "FRCA_NuanceContextExpert", "rework requested");

        rule_stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Revision)
            .await
            .unwrap();

        let revised = task.version("grammar_corrected_frca_rev").unwrap();
        assert!(revised.contains("très intéressant"));
        assert!(!revised.contains("trop cool"));
        // Requester was nuance, not the final gate: linear next of grammar.
        assert_eq!(
            task.current_state,
            TaskState::pending(Direction::EnToFrCa, Stage::Nuance)
        );
    }

    #[tokio::test]
    async fn success_resets_retry_counter() {
        let mut task = make_task("Le rapport est impeccable.");
        task.bump_retry("WorkflowEngine", "frca grammar review");
        task.bump_retry("WorkflowEngine", "frca grammar review");

        rule_stage()
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();
        assert_eq!(task.retry_count, 0);
    }
}
