use std::fmt;

use serde::{Deserialize, Serialize};

/// Language direction of a bureau task.
///
/// Only the two Canadian pairs are supported; anything else is rejected at
/// intake as a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// English (Canada) source into Canadian French.
    EnToFrCa,
    /// Canadian French source into English (Canada).
    FrCaToEn,
}

impl Direction {
    /// Resolve a direction from a locale pair, `None` when the pair is
    /// unsupported.
    pub fn from_pair(source: &str, target: &str) -> Option<Direction> {
        match (
            source.to_ascii_uppercase().as_str(),
            target.to_ascii_uppercase().as_str(),
        ) {
            ("EN_CA", "FR_CA") => Some(Direction::EnToFrCa),
            ("FR_CA", "EN_CA") => Some(Direction::FrCaToEn),
            _ => None,
        }
    }

    /// Short target-language code used in state names and version keys.
    pub fn target_code(self) -> &'static str {
        match self {
            Direction::EnToFrCa => "frca",
            Direction::FrCaToEn => "enca",
        }
    }

    /// Target-language tag used in terminology markers, e.g. `FR_CA`.
    pub fn target_tag(self) -> &'static str {
        match self {
            Direction::EnToFrCa => "FR_CA",
            Direction::FrCaToEn => "EN_CA",
        }
    }

    /// Human-oriented target-language label used in stage markers.
    pub fn target_label(self) -> &'static str {
        match self {
            Direction::EnToFrCa => "FR-CA",
            Direction::FrCaToEn => "EN-CA",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::EnToFrCa => write!(f, "EN_CA->FR_CA"),
            Direction::FrCaToEn => write!(f, "FR_CA->EN_CA"),
        }
    }
}

/// The fixed pipeline steps, in linear order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Translation,
    Grammar,
    Nuance,
    Style,
    Terminology,
    FinalGate,
}

impl Stage {
    /// The next step in the linear pipeline; `None` after the final gate.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Translation => Some(Stage::Grammar),
            Stage::Grammar => Some(Stage::Nuance),
            Stage::Nuance => Some(Stage::Style),
            Stage::Style => Some(Stage::Terminology),
            Stage::Terminology => Some(Stage::FinalGate),
            Stage::FinalGate => None,
        }
    }

    /// Version key under which this stage publishes its output artifact.
    pub fn output_key(self, direction: Direction) -> String {
        let t = direction.target_code();
        match self {
            Stage::Translation => format!("initial_translation_{t}"),
            Stage::Grammar => format!("grammar_corrected_{t}"),
            Stage::Nuance => format!("nuance_corrected_{t}"),
            Stage::Style => format!("style_tone_corrected_{t}"),
            Stage::Terminology => format!("terminology_corrected_{t}"),
            Stage::FinalGate => format!("final_approved_{t}"),
        }
    }

    /// Revision-count key used when the requester does not supply a more
    /// specific one. Keys are direction-scoped so the two pipelines never
    /// share a counter.
    pub fn default_revision_key(self, direction: Direction) -> String {
        match (self, direction) {
            (Stage::Translation, Direction::EnToFrCa) => "en_frca_initial_translation".to_string(),
            (Stage::Translation, Direction::FrCaToEn) => "enca_initial_translation".to_string(),
            _ => format!("{}_{}", direction.target_code(), self.key_name()),
        }
    }

    fn key_name(self) -> &'static str {
        match self {
            Stage::Translation => "initial_translation",
            Stage::Grammar => "grammar",
            Stage::Nuance => "nuance",
            Stage::Style => "style",
            Stage::Terminology => "terminology",
            Stage::FinalGate => "final",
        }
    }
}

/// How a unit currently relates to its stage: a first-pass review, a rework
/// pass requested by a downstream stage, or waiting out a transient assessor
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Review,
    Revision,
    Retry,
}

/// The full state space of a bureau task.
///
/// A task is either waiting for intake routing, inside one pipeline stage of
/// one direction, or in a terminal state. Terminal states are never
/// dispatched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Uploaded,
    InStage {
        direction: Direction,
        stage: Stage,
        phase: Phase,
    },
    Completed(Direction),
    FailedFinalReview,
    MaxRetriesExceeded,
    MaxRevisionsExceeded,
    ConfigurationError,
    UnknownFailure,
    OnHold,
    Cancelled,
}

impl TaskState {
    /// Review-pending state of a stage.
    pub fn pending(direction: Direction, stage: Stage) -> TaskState {
        TaskState::InStage {
            direction,
            stage,
            phase: Phase::Review,
        }
    }

    /// Revision-pending state of a stage. Entered only by being routed to,
    /// never by linear advance.
    pub fn revision(direction: Direction, stage: Stage) -> TaskState {
        TaskState::InStage {
            direction,
            stage,
            phase: Phase::Revision,
        }
    }

    /// Retry-pending state of a stage after a transient assessor failure.
    pub fn retry(direction: Direction, stage: Stage) -> TaskState {
        TaskState::InStage {
            direction,
            stage,
            phase: Phase::Retry,
        }
    }

    /// The state a unit advances to after completing `stage` on the normal
    /// linear path.
    pub fn linear_next(direction: Direction, stage: Stage) -> TaskState {
        match stage.next() {
            Some(next) => TaskState::pending(direction, next),
            None => TaskState::Completed(direction),
        }
    }

    /// Terminal states are never dispatched again. `OnHold` counts: it needs
    /// out-of-band investigation, not automatic retries.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Uploaded | TaskState::InStage { .. })
    }

    /// Failure states that warrant escalation to a human reviewer.
    pub fn is_hard_failure(self) -> bool {
        matches!(
            self,
            TaskState::FailedFinalReview
                | TaskState::MaxRetriesExceeded
                | TaskState::MaxRevisionsExceeded
                | TaskState::UnknownFailure
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Uploaded => write!(f, "task_uploaded"),
            TaskState::InStage {
                direction,
                stage,
                phase,
            } => write_stage_state(f, *direction, *stage, *phase),
            TaskState::Completed(direction) => {
                write!(f, "task_completed_{}", direction.target_code())
            }
            TaskState::FailedFinalReview => write!(f, "task_failed_final_review"),
            TaskState::MaxRetriesExceeded => write!(f, "task_max_retries_exceeded_failure"),
            TaskState::MaxRevisionsExceeded => write!(f, "task_max_revisions_exceeded_failure"),
            TaskState::ConfigurationError => write!(f, "task_configuration_error_failure"),
            TaskState::UnknownFailure => write!(f, "task_unknown_failure"),
            TaskState::OnHold => write!(f, "task_on_hold"),
            TaskState::Cancelled => write!(f, "task_cancelled"),
        }
    }
}

// Keeps the historical state names so logs and reports read the same as the
// bureau's earlier tooling.
fn write_stage_state(
    f: &mut fmt::Formatter<'_>,
    direction: Direction,
    stage: Stage,
    phase: Phase,
) -> fmt::Result {
    let t = direction.target_code();
    match (stage, phase) {
        (Stage::Translation, Phase::Review) => match direction {
            Direction::EnToFrCa => write!(f, "en_frca_initial_translation_pending"),
            Direction::FrCaToEn => write!(f, "frca_en_initial_translation_pending"),
        },
        (Stage::Translation, Phase::Revision) => match direction {
            Direction::EnToFrCa => write!(f, "en_frca_initial_translation_revision_pending"),
            Direction::FrCaToEn => write!(f, "enca_initial_translation_revision_pending"),
        },
        (Stage::Translation, Phase::Retry) => {
            write!(f, "{t}_initial_translation_api_error_retry_pending")
        }
        (Stage::Grammar, Phase::Review) => write!(f, "{t}_grammar_review_pending"),
        (Stage::Grammar, Phase::Revision) => write!(f, "{t}_grammar_revision_pending"),
        (Stage::Grammar, Phase::Retry) => write!(f, "{t}_grammar_api_error_retry_pending"),
        (Stage::Nuance, Phase::Review) => write!(f, "{t}_nuance_context_review_pending"),
        (Stage::Nuance, Phase::Revision) => write!(f, "{t}_nuance_revision_pending"),
        (Stage::Nuance, Phase::Retry) => write!(f, "{t}_nuance_api_error_retry_pending"),
        (Stage::Style, Phase::Review) => write!(f, "{t}_style_tone_review_pending"),
        (Stage::Style, Phase::Revision) => write!(f, "{t}_style_revision_pending"),
        (Stage::Style, Phase::Retry) => write!(f, "{t}_style_api_error_retry_pending"),
        (Stage::Terminology, Phase::Review) => write!(f, "{t}_terminology_review_pending"),
        (Stage::Terminology, Phase::Revision) => write!(f, "{t}_terminology_revision_pending"),
        (Stage::Terminology, Phase::Retry) => {
            write!(f, "{t}_terminology_api_error_retry_pending")
        }
        (Stage::FinalGate, Phase::Review) => write!(f, "{t}_final_review_pending"),
        (Stage::FinalGate, Phase::Revision) => write!(f, "{t}_final_review_revision_pending"),
        (Stage::FinalGate, Phase::Retry) => write!(f, "{t}_final_review_api_error_retry_pending"),
    }
}
