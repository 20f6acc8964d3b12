use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::assessors::{Finding, QualityProbe};
use crate::config::FinalCheck;
use crate::observe::{Level, WorkflowObserver};
use crate::state_machine::{
    Direction, FeedbackRecord, Phase, RequestedAction, Stage, TaskState, TranslationTask,
};

use super::{request_revision, take_input, RevisionRequest, StageProcessor};

/// A failed gate check with its routing decision.
struct GateFinding {
    check: FinalCheck,
    comment: String,
    target_stage: Stage,
    stage_key_suffix: &'static str,
}

/// Final quality gate. Runs its whole checklist on the terminology output;
/// the first failing check, in the configured priority order, decides which
/// upstream stage gets the rework.
pub struct FinalGateStage {
    observer: Arc<dyn WorkflowObserver>,
    probe: Arc<dyn QualityProbe>,
    check_order: Vec<FinalCheck>,
    revision_cap: u32,
    subtle_cap: u32,
}

impl FinalGateStage {
    pub fn new(
        observer: Arc<dyn WorkflowObserver>,
        probe: Arc<dyn QualityProbe>,
        check_order: Vec<FinalCheck>,
        revision_cap: u32,
        subtle_cap: u32,
    ) -> Self {
        Self {
            observer,
            probe,
            check_order,
            revision_cap,
            subtle_cap,
        }
    }

    fn actor(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "FinalQualityGate_FRCA",
            Direction::FrCaToEn => "FinalQualityGate_ENCA",
        }
    }

    fn feedback_kind(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "FinalReviewFRCA",
            Direction::FrCaToEn => "FinalReviewENCA",
        }
    }

    /// Expected stage markers are present in the reviewed artifact.
    fn check_formatting(direction: Direction, text: &str) -> Option<String> {
        let style_marker = format!("[{} Style OK", direction.target_label());
        let terms_marker = format!("[TermsOK {}]", direction.target_tag());
        if text.contains(&style_marker) && text.contains(&terms_marker) {
            None
        } else {
            Some(
                "Failed formatting/completeness: expected markers from the style or \
                 terminology stages are missing."
                    .to_string(),
            )
        }
    }

    /// A prior stage's complaint that was never followed by its own
    /// all-clear, or a terminology issue flag still present in the text.
    fn check_unresolved_qa(task: &TranslationTask, text: &str) -> Option<String> {
        if text.contains("[TermsIssue") {
            return Some("Terminology issues previously flagged appear unresolved.".to_string());
        }

        let mut last_by_stage: HashMap<Stage, &FeedbackRecord> = HashMap::new();
        for fb in &task.feedback {
            if let Some(stage) = fb.issuing_stage
                && stage != Stage::FinalGate
                && matches!(
                    fb.requested_action,
                    RequestedAction::Proceed | RequestedAction::RevisionNeeded
                )
            {
                last_by_stage.insert(stage, fb);
            }
        }
        last_by_stage
            .into_values()
            .find(|fb| fb.requested_action == RequestedAction::RevisionNeeded)
            .map(|fb| {
                format!(
                    "Unresolved {} complaint from {}: {}",
                    fb.kind, fb.actor, fb.comment
                )
            })
    }

    /// Register of the text clashes with the identified source context.
    fn check_cohesion(task: &TranslationTask, direction: Direction, text: &str) -> Option<String> {
        let context = task
            .version(&format!("source_context_analysis_{}", direction.target_code()))
            .unwrap_or("Context: Unknown");
        let lower = text.to_lowercase();

        if context.contains("Technical/Software") {
            let informal: &[&str] = match direction {
                Direction::EnToFrCa => &["trop cool", "genre là", "super le fun"],
                Direction::FrCaToEn => &["super chill", "buddy"],
            };
            for phrase in informal {
                if lower.contains(phrase) {
                    return Some(format!(
                        "Cohesion issue: technical source context ('{context}') but the text \
                         contains the informal phrase '{phrase}'."
                    ));
                }
            }
        }
        if context.contains("Strong Canadian cultural references")
            && lower.contains("bagnole")
            && !lower.contains("char")
        {
            return Some(
                "Cohesion issue: strongly Canadian context, but 'bagnole' was used instead of \
                 the more typical 'char' or 'auto'."
                    .to_string(),
            );
        }
        None
    }

    fn checklist_for(&self, task: &TranslationTask) -> Vec<FinalCheck> {
        match &task.settings.final_checklist {
            Some(enabled) => self
                .check_order
                .iter()
                .copied()
                .filter(|check| enabled.contains(check))
                .collect(),
            None => self.check_order.clone(),
        }
    }
}

#[async_trait]
impl StageProcessor for FinalGateStage {
    fn stage(&self) -> Stage {
        Stage::FinalGate
    }

    fn input_contract(&self, direction: Direction, _phase: Phase) -> Vec<String> {
        vec![Stage::Terminology.output_key(direction)]
    }

    async fn process(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        phase: Phase,
    ) -> Result<()> {
        let actor = Self::actor(direction);
        let step = format!("{} final review", direction.target_tag());

        let keys = self.input_contract(direction, phase);
        let Some((input_key, text)) = take_input(task, &keys, actor, &step) else {
            return Ok(());
        };

        let checklist = self.checklist_for(task);
        self.observer.event(
            Some(&task.id),
            Level::Info,
            &format!("{step} on '{input_key}', checklist {checklist:?}"),
        );

        let t = direction.target_code();
        let mut failure: Option<GateFinding> = None;
        let mut subtle_exhausted: Option<String> = None;

        for check in checklist {
            let outcome = match check {
                FinalCheck::Formatting => {
                    Self::check_formatting(direction, &text).map(|comment| GateFinding {
                        check,
                        comment,
                        target_stage: Stage::Style,
                        stage_key_suffix: "style_by_final",
                    })
                }
                FinalCheck::UnresolvedQa => {
                    Self::check_unresolved_qa(task, &text).map(|comment| GateFinding {
                        check,
                        comment,
                        target_stage: Stage::Style,
                        stage_key_suffix: "style_by_final",
                    })
                }
                FinalCheck::Cohesion => {
                    Self::check_cohesion(task, direction, &text).map(|comment| GateFinding {
                        check,
                        comment,
                        target_stage: Stage::Nuance,
                        stage_key_suffix: "nuance_by_final",
                    })
                }
                FinalCheck::SubtleQuality => {
                    if !self.probe.flag_subtle_issue(&task.id) {
                        None
                    } else if task.revision_count(&format!("{t}_overall_quality_by_final"))
                        < self.subtle_cap
                    {
                        Some(GateFinding {
                            check,
                            comment: "Subtle overall quality concern (flow, nuance)."
                                .to_string(),
                            target_stage: Stage::Nuance,
                            stage_key_suffix: "overall_quality_by_final",
                        })
                    } else {
                        subtle_exhausted = Some(
                            "Subtle overall quality concern, but its revision budget is \
                             exhausted."
                                .to_string(),
                        );
                        None
                    }
                }
            };
            if let Some(found) = outcome {
                failure = Some(found);
                break;
            }
        }

        let kind = Self::feedback_kind(direction);
        match (failure, subtle_exhausted) {
            (None, None) => {
                task.publish_version(&Stage::FinalGate.output_key(direction), text, actor);
                task.log_feedback(FeedbackRecord::finalized(
                    actor,
                    kind,
                    format!("{step} passed; all checks clean."),
                ));
                task.transition(
                    TaskState::Completed(direction),
                    actor,
                    format!("{step} PASSED."),
                );
            }
            (Some(found), _) => {
                let cap = if found.check == FinalCheck::SubtleQuality {
                    self.subtle_cap
                } else {
                    self.revision_cap
                };
                let finding = Finding::new(
                    match found.check {
                        FinalCheck::Formatting => "formatting",
                        FinalCheck::UnresolvedQa => "unresolved_qa",
                        FinalCheck::Cohesion => "cohesion_context",
                        FinalCheck::SubtleQuality => "overall_quality",
                    },
                    "",
                    None,
                    crate::assessors::Severity::Low,
                );
                request_revision(
                    task,
                    actor,
                    Stage::FinalGate,
                    kind,
                    format!("{step} FAILED: {}", found.comment),
                    vec![finding],
                    RevisionRequest {
                        target: TaskState::revision(direction, found.target_stage),
                        stage_key: format!("{t}_{}", found.stage_key_suffix),
                    },
                    cap,
                );
            }
            (None, Some(reason)) => {
                task.log_feedback(FeedbackRecord::hard_failed(
                    actor,
                    Stage::FinalGate,
                    kind,
                    reason.clone(),
                ));
                task.transition(
                    TaskState::FailedFinalReview,
                    actor,
                    format!("{step} FAILED hard: {reason}"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessors::{NeverFlag, RandomProbe};
    use crate::observe::NullObserver;
    use crate::state_machine::TaskSettings;

    fn default_order() -> Vec<FinalCheck> {
        vec![
            FinalCheck::Formatting,
            FinalCheck::UnresolvedQa,
            FinalCheck::Cohesion,
            FinalCheck::SubtleQuality,
        ]
    }

    fn gate(probe: Arc<dyn QualityProbe>) -> FinalGateStage {
        FinalGateStage::new(Arc::new(NullObserver), probe, default_order(), 2, 1)
    }

    fn make_task(terminology_output: &str) -> TranslationTask {
        let mut task =
            TranslationTask::new("t1", "source", "EN_CA", "FR_CA", TaskSettings::default());
        task.publish_version(
            "terminology_corrected_frca",
            terminology_output,
            "TerminologyChecker",
        );
        task.transition(
            TaskState::pending(Direction::EnToFrCa, Stage::FinalGate),
            "TerminologyChecker",
            "terminology done",
        );
        task
    }

    const CLEAN_TEXT: &str =
        "Texte final. [FR-CA Style OK ('neutral_formal')] [TermsOK FR_CA]";

    #[tokio::test]
    async fn clean_review_completes_the_task() {
        let mut task = make_task(CLEAN_TEXT);
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::Completed(Direction::EnToFrCa)
        );
        assert_eq!(task.version("final_approved_frca"), Some(CLEAN_TEXT));
        assert_eq!(
            task.feedback.last().unwrap().requested_action,
            RequestedAction::Finalized
        );
    }

    #[tokio::test]
    async fn missing_markers_route_to_style_revision() {
        let mut task = make_task("Texte sans marqueurs.");
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Style)
        );
        assert_eq!(task.revision_count("frca_style_by_final"), 1);
        assert_eq!(
            task.settings.last_revision_request_key.as_deref(),
            Some("frca_style_by_final")
        );
    }

    #[tokio::test]
    async fn terms_issue_marker_fails_unresolved_qa() {
        let mut task = make_task(
            "Texte final. [FR-CA Style OK ('neutral_formal')] [TermsOK FR_CA] [TermsIssue FR_CA - 1 critical]",
        );
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Style)
        );
    }

    #[tokio::test]
    async fn stale_complaint_fails_unresolved_qa() {
        let mut task = make_task(CLEAN_TEXT);
        // A grammar complaint that was never followed by a grammar all-clear.
        task.log_feedback(FeedbackRecord::revision(
            "FRCA_GrammarSpecialist",
            Stage::Grammar,
            "GrammarFRCA",
            "anglicisms remain".to_string(),
            TaskState::revision(Direction::EnToFrCa, Stage::Translation),
            Vec::new(),
        ));
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Style)
        );
        let request = task.feedback.last().unwrap();
        assert!(request.comment.contains("Unresolved"));
    }

    #[tokio::test]
    async fn cleared_complaint_passes_unresolved_qa() {
        let mut task = make_task(CLEAN_TEXT);
        task.log_feedback(FeedbackRecord::revision(
            "FRCA_GrammarSpecialist",
            Stage::Grammar,
            "GrammarFRCA",
            "anglicisms remain".to_string(),
            TaskState::revision(Direction::EnToFrCa, Stage::Translation),
            Vec::new(),
        ));
        task.log_feedback(FeedbackRecord::proceed(
            "FRCA_GrammarSpecialist",
            Stage::Grammar,
            "GrammarFRCA",
            "all clear after rework".to_string(),
        ));
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::Completed(Direction::EnToFrCa)
        );
    }

    #[tokio::test]
    async fn cohesion_clash_routes_to_nuance_revision() {
        let mut task = make_task(
            "Ce module est super le fun. [FR-CA Style OK ('neutral_formal')] [TermsOK FR_CA]",
        );
        task.publish_version(
            "source_context_analysis_frca",
            "Identified context: Technical/Software.",
            "FRCA_NuanceContextExpert",
        );
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Nuance)
        );
        assert_eq!(task.revision_count("frca_nuance_by_final"), 1);
    }

    #[tokio::test]
    async fn subtle_quality_uses_its_own_budget_then_fails_hard() {
        let mut task = make_task(CLEAN_TEXT);
        let gate = gate(Arc::new(RandomProbe::new(1.0, 9)));

        // First flag fits inside the subtle-quality budget of 1.
        gate.process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();
        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Nuance)
        );
        assert_eq!(task.revision_count("frca_overall_quality_by_final"), 1);

        // Back at the gate, the probe flags again: budget exhausted, the
        // gate fails the unit outright instead of looping.
        task.transition(
            TaskState::pending(Direction::EnToFrCa, Stage::FinalGate),
            "WorkflowEngine",
            "revision resolved",
        );
        gate.process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();
        assert_eq!(task.current_state, TaskState::FailedFinalReview);
        assert_eq!(
            task.feedback.last().unwrap().requested_action,
            RequestedAction::HardFailed
        );
    }

    #[tokio::test]
    async fn per_task_checklist_disables_checks() {
        let mut task = make_task("Texte sans marqueurs.");
        task.settings.final_checklist = Some(vec![FinalCheck::Cohesion]);
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        // Formatting is off for this task, and cohesion has nothing to flag.
        assert_eq!(
            task.current_state,
            TaskState::Completed(Direction::EnToFrCa)
        );
    }

    #[tokio::test]
    async fn check_order_decides_priority() {
        // Cohesion listed first wins over formatting even though both fail.
        let gate = FinalGateStage::new(
            Arc::new(NullObserver),
            Arc::new(NeverFlag),
            vec![FinalCheck::Cohesion, FinalCheck::Formatting],
            2,
            1,
        );
        let mut task = make_task("Ce module est super le fun, sans marqueurs.");
        task.publish_version(
            "source_context_analysis_frca",
            "Identified context: Technical/Software.",
            "FRCA_NuanceContextExpert",
        );
        gate.process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();

        assert_eq!(
            task.current_state,
            TaskState::revision(Direction::EnToFrCa, Stage::Nuance)
        );
        assert_eq!(task.revision_count("frca_nuance_by_final"), 1);
        assert_eq!(task.revision_count("frca_style_by_final"), 0);
    }

    #[tokio::test]
    async fn missing_input_parks_on_hold() {
        let mut task =
            TranslationTask::new("t1", "source", "EN_CA", "FR_CA", TaskSettings::default());
        task.transition(
            TaskState::pending(Direction::EnToFrCa, Stage::FinalGate),
            "System",
            "forced",
        );
        gate(Arc::new(NeverFlag))
            .process(&mut task, Direction::EnToFrCa, Phase::Review)
            .await
            .unwrap();
        assert_eq!(task.current_state, TaskState::OnHold);
    }
}
