//! Stage processors: one per pipeline step, all behind a common contract.
//!
//! A processor owns the review and revision passes of its step. It selects
//! its input artifact through a declared preference list, consults its
//! assessors, and converts every classified failure into a state transition.
//! Only genuinely unclassified errors cross the engine boundary.

pub mod final_gate;
pub mod grammar;
pub mod nuance;
pub mod style;
pub mod terminology;
pub mod translation;

use anyhow::Result;
use async_trait::async_trait;

use crate::assessors::Finding;
use crate::state_machine::{
    Direction, FeedbackRecord, Phase, RequestedAction, Stage, TaskState, TranslationTask,
};

pub use final_gate::FinalGateStage;
pub use grammar::GrammarStage;
pub use nuance::NuanceStage;
pub use style::StyleStage;
pub use terminology::TerminologyStage;
pub use translation::TranslationStage;

/// One pipeline step. Implementations must be shareable across units.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    /// The step this processor owns in the dispatch table.
    fn stage(&self) -> Stage;

    /// Version keys accepted as input for the given pass, in preference
    /// order. Declared up front so input selection is a table lookup, not
    /// string assembly at call sites.
    fn input_contract(&self, direction: Direction, phase: Phase) -> Vec<String>;

    /// Process a unit currently in one of this processor's states. All
    /// classified outcomes become state transitions on the unit; an `Err`
    /// is an unclassified failure the engine turns into `UnknownFailure`.
    async fn process(
        &self,
        task: &mut TranslationTask,
        direction: Direction,
        phase: Phase,
    ) -> Result<()>;
}

/// Select the unit's input artifact per the declared contract. When none of
/// the declared versions exist the unit is parked on hold for investigation
/// and `None` is returned.
pub(crate) fn take_input(
    task: &mut TranslationTask,
    keys: &[String],
    actor: &str,
    step: &str,
) -> Option<(String, String)> {
    match task.select_version(keys) {
        Some((key, content)) => Some((key.to_string(), content.to_string())),
        None => {
            let reason = format!("missing input artifact for {step}; looked for {keys:?}");
            task.log_feedback(FeedbackRecord::error(actor, reason.clone()));
            task.transition(TaskState::OnHold, actor, reason);
            None
        }
    }
}

/// The most recent feedback entry that routed the unit into `revision_state`.
pub(crate) fn revision_request_for(
    task: &TranslationTask,
    revision_state: TaskState,
) -> Option<&FeedbackRecord> {
    task.feedback.iter().rev().find(|fb| {
        fb.requested_action == RequestedAction::RevisionNeeded
            && fb.target_revision_state == Some(revision_state)
    })
}

/// Apply a requester's suggested fixes to an artifact: each finding's term is
/// replaced by the leading phrase of its suggestion.
pub(crate) fn apply_suggestions(text: &str, findings: &[Finding]) -> String {
    let mut out = text.to_string();
    for finding in findings {
        let Some(suggestion) = &finding.suggestion else {
            continue;
        };
        let replacement = suggestion.split(" (").next().unwrap_or(suggestion).trim();
        if replacement.is_empty() || finding.term.is_empty() {
            continue;
        }
        if let Ok(pattern) = regex::RegexBuilder::new(&regex::escape(&finding.term))
            .case_insensitive(true)
            .build()
        {
            out = pattern.replace_all(&out, replacement).into_owned();
        }
    }
    out
}

/// A quality failure's routing decision: which state gets the rework and
/// which counter pays for it.
pub(crate) struct RevisionRequest {
    pub target: TaskState,
    pub stage_key: String,
}

/// Record a revision request: log the feedback, charge the stage-key counter
/// and either route to the target revision state or fail the unit the moment
/// the counter would exceed its cap.
pub(crate) fn request_revision(
    task: &mut TranslationTask,
    actor: &str,
    issuing_stage: Stage,
    kind: &str,
    comment: String,
    findings: Vec<Finding>,
    request: RevisionRequest,
    cap: u32,
) {
    task.log_feedback(FeedbackRecord::revision(
        actor,
        issuing_stage,
        kind,
        comment,
        request.target,
        findings,
    ));
    let count = task.bump_revision(&request.stage_key, actor);
    if count > cap {
        task.transition(
            TaskState::MaxRevisionsExceeded,
            actor,
            format!(
                "max revisions ({cap}) exceeded for stage key '{}'",
                request.stage_key
            ),
        );
    } else {
        task.set_revision_request_key(&request.stage_key);
        task.transition(
            request.target,
            actor,
            format!(
                "revision requested (attempt {count} for '{}')",
                request.stage_key
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessors::Severity;
    use crate::state_machine::TaskSettings;

    fn make_task() -> TranslationTask {
        TranslationTask::new("t1", "source", "EN_CA", "FR_CA", TaskSettings::default())
    }

    #[test]
    fn take_input_prefers_first_existing_key() {
        let mut task = make_task();
        task.publish_version("grammar_corrected_frca", "base", "Grammar");
        let keys = vec![
            "grammar_corrected_frca_rev".to_string(),
            "grammar_corrected_frca".to_string(),
        ];
        let (key, content) = take_input(&mut task, &keys, "Nuance", "nuance review").unwrap();
        assert_eq!(key, "grammar_corrected_frca");
        assert_eq!(content, "base");
    }

    #[test]
    fn take_input_parks_unit_on_hold_when_missing() {
        let mut task = make_task();
        let keys = vec!["grammar_corrected_frca".to_string()];
        assert!(take_input(&mut task, &keys, "Nuance", "nuance review").is_none());
        assert_eq!(task.current_state, TaskState::OnHold);
        assert_eq!(task.feedback.last().unwrap().kind, "Error");
        assert!(task.failure_reason.is_some());
    }

    #[test]
    fn apply_suggestions_replaces_terms_case_insensitively() {
        let findings = vec![
            Finding::new(
                "anglicism",
                "checker",
                Some("vérifier (ou consulter)".to_string()),
                Severity::Low,
            ),
            Finding::new(
                "untranslated_term",
                "Computer",
                Some("ordinateur".to_string()),
                Severity::High,
            ),
        ];
        let fixed = apply_suggestions("Il faut CHECKER le computer.", &findings);
        assert_eq!(fixed, "Il faut vérifier le ordinateur.");
    }

    #[test]
    fn apply_suggestions_skips_findings_without_suggestion() {
        let findings = vec![Finding::new("overall_quality", "", None, Severity::Low)];
        assert_eq!(apply_suggestions("unchanged", &findings), "unchanged");
    }

    #[test]
    fn request_revision_routes_while_under_cap() {
        let mut task = make_task();
        let target = TaskState::revision(Direction::EnToFrCa, Stage::Translation);
        request_revision(
            &mut task,
            "FRCA_GrammarSpecialist",
            Stage::Grammar,
            "GrammarFRCA",
            "anglicisms found".to_string(),
            Vec::new(),
            RevisionRequest {
                target,
                stage_key: "en_frca_initial_translation".to_string(),
            },
            2,
        );
        assert_eq!(task.current_state, target);
        assert_eq!(task.revision_count("en_frca_initial_translation"), 1);
        assert_eq!(
            task.settings.last_revision_request_key.as_deref(),
            Some("en_frca_initial_translation")
        );
    }

    #[test]
    fn request_revision_fails_on_first_attempt_past_cap() {
        let mut task = make_task();
        let target = TaskState::revision(Direction::EnToFrCa, Stage::Style);
        for _ in 0..2 {
            request_revision(
                &mut task,
                "FinalQualityGate_FRCA",
                Stage::FinalGate,
                "FinalReviewFRCA",
                "formatting issue".to_string(),
                Vec::new(),
                RevisionRequest {
                    target,
                    stage_key: "frca_style_by_final".to_string(),
                },
                2,
            );
            assert_eq!(task.current_state, target);
        }

        // Third attempt pushes the counter to 3, past the cap of 2.
        request_revision(
            &mut task,
            "FinalQualityGate_FRCA",
            Stage::FinalGate,
            "FinalReviewFRCA",
            "formatting issue".to_string(),
            Vec::new(),
            RevisionRequest {
                target,
                stage_key: "frca_style_by_final".to_string(),
            },
            2,
        );
        assert_eq!(task.current_state, TaskState::MaxRevisionsExceeded);
        assert_eq!(task.revision_count("frca_style_by_final"), 3);
    }

    #[test]
    fn revision_request_lookup_finds_newest_match() {
        let mut task = make_task();
        let target = TaskState::revision(Direction::EnToFrCa, Stage::Grammar);
        task.log_feedback(FeedbackRecord::revision(
            "FRCA_NuanceContextExpert",
            Stage::Nuance,
            "NuanceFRCA",
            "older".to_string(),
            target,
            Vec::new(),
        ));
        task.log_feedback(FeedbackRecord::revision(
            "FinalQualityGate_FRCA",
            Stage::FinalGate,
            "FinalReviewFRCA",
            "newer".to_string(),
            target,
            Vec::new(),
        ));

        let found = revision_request_for(&task, target).unwrap();
        assert_eq!(found.comment, "newer");
        assert_eq!(found.issuing_stage, Some(Stage::FinalGate));
        assert!(revision_request_for(
            &task,
            TaskState::revision(Direction::EnToFrCa, Stage::Style)
        )
        .is_none());
    }
}
