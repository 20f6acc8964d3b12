use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessors::Finding;
use crate::config::FinalCheck;

use super::state::{Direction, Stage, TaskState};

/// What a feedback entry asks the workflow to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedAction {
    None,
    Proceed,
    RevisionNeeded,
    Finalized,
    HardFailed,
}

/// One entry in a task's QA feedback trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub issuing_stage: Option<Stage>,
    pub kind: String,
    pub comment: String,
    pub requested_action: RequestedAction,
    pub target_revision_state: Option<TaskState>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl FeedbackRecord {
    fn base(actor: &str, issuing_stage: Option<Stage>, kind: &str, comment: String) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            issuing_stage,
            kind: kind.to_string(),
            comment,
            requested_action: RequestedAction::None,
            target_revision_state: None,
            findings: Vec::new(),
        }
    }

    /// Positive assessment; the unit may move on.
    pub fn proceed(actor: &str, stage: Stage, kind: &str, comment: String) -> Self {
        Self {
            requested_action: RequestedAction::Proceed,
            ..Self::base(actor, Some(stage), kind, comment)
        }
    }

    /// Quality failure asking `target` to be re-entered for rework.
    pub fn revision(
        actor: &str,
        stage: Stage,
        kind: &str,
        comment: String,
        target: TaskState,
        findings: Vec<Finding>,
    ) -> Self {
        Self {
            requested_action: RequestedAction::RevisionNeeded,
            target_revision_state: Some(target),
            findings,
            ..Self::base(actor, Some(stage), kind, comment)
        }
    }

    /// Final-gate approval.
    pub fn finalized(actor: &str, kind: &str, comment: String) -> Self {
        Self {
            requested_action: RequestedAction::Finalized,
            ..Self::base(actor, Some(Stage::FinalGate), kind, comment)
        }
    }

    /// Quality failure with no viable revision target.
    pub fn hard_failed(actor: &str, stage: Stage, kind: &str, comment: String) -> Self {
        Self {
            requested_action: RequestedAction::HardFailed,
            ..Self::base(actor, Some(stage), kind, comment)
        }
    }

    /// Processing error worth keeping in the trail (missing artifact etc.).
    pub fn error(actor: &str, comment: String) -> Self {
        Self::base(actor, None, "Error", comment)
    }
}

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    TaskCreated,
    StateChange,
    VersionPublished,
    FeedbackLogged,
    RetryIncremented,
    RetryReset,
    RevisionIncremented,
    Escalated,
}

/// One entry in a task's audit history. Append-only; the vector order is the
/// processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: ActionKind,
    pub previous_state: Option<TaskState>,
    pub new_state: Option<TaskState>,
    pub details: String,
}

/// Fixed per-task settings resolved at creation. Read-only to stages, except
/// for the revision-request key which the requesting stage records through
/// [`TranslationTask::set_revision_request_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSettings {
    pub project_code: String,
    pub target_style: String,
    /// Which final-gate checks apply to this task; `None` means all of them.
    #[serde(default)]
    pub final_checklist: Option<Vec<FinalCheck>>,
    /// Stage key of the most recent revision request, consulted by the
    /// engine before re-dispatching a revision-pending unit.
    #[serde(default)]
    pub last_revision_request_key: Option<String>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            project_code: "proj_alpha".to_string(),
            target_style: "neutral_formal".to_string(),
            final_checklist: None,
            last_revision_request_key: None,
        }
    }
}

/// One document moving through the bureau pipeline.
///
/// All mutation goes through the methods below; none of them perform I/O and
/// none of them fail. Callers enforce preconditions before calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationTask {
    pub id: String,
    pub original_text: String,
    pub source_language: String,
    pub target_language: String,
    pub current_state: TaskState,
    pub versions: HashMap<String, String>,
    pub feedback: Vec<FeedbackRecord>,
    pub history: Vec<HistoryEvent>,
    pub settings: TaskSettings,
    pub retry_count: u32,
    pub revision_counts: HashMap<String, u32>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationTask {
    pub fn new(
        id: impl Into<String>,
        original_text: impl Into<String>,
        source_language: &str,
        target_language: &str,
        settings: TaskSettings,
    ) -> Self {
        let id = id.into();
        let original_text = original_text.into();
        let now = Utc::now();
        let mut versions = HashMap::new();
        versions.insert("original".to_string(), original_text.clone());

        let mut task = Self {
            id: id.clone(),
            original_text,
            source_language: source_language.to_ascii_uppercase(),
            target_language: target_language.to_ascii_uppercase(),
            current_state: TaskState::Uploaded,
            versions,
            feedback: Vec::new(),
            history: Vec::new(),
            settings,
            retry_count: 0,
            revision_counts: HashMap::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        task.record(
            "System",
            ActionKind::TaskCreated,
            None,
            Some(TaskState::Uploaded),
            format!("Task {id} initialized."),
        );
        task
    }

    /// The pipeline direction for this task's locale pair, `None` when the
    /// pair is unsupported.
    pub fn direction(&self) -> Option<Direction> {
        Direction::from_pair(&self.source_language, &self.target_language)
    }

    /// Move the task to `new_state`, recording the change in history. The
    /// summary of a terminal-failure transition becomes the task's
    /// post-mortem reason.
    pub fn transition(&mut self, new_state: TaskState, actor: &str, summary: impl Into<String>) {
        let summary = summary.into();
        let previous = self.current_state;
        self.current_state = new_state;
        if new_state.is_terminal() && !matches!(new_state, TaskState::Completed(_)) {
            self.failure_reason.get_or_insert(summary.clone());
        }
        self.record(
            actor,
            ActionKind::StateChange,
            Some(previous),
            Some(new_state),
            summary,
        );
    }

    /// Upsert an artifact version. Versions are never deleted; the insertion
    /// order lives in history, not in the map.
    pub fn publish_version(&mut self, name: &str, content: impl Into<String>, actor: &str) {
        let content = content.into();
        let preview: String = content.chars().take(40).collect();
        self.versions.insert(name.to_string(), content);
        self.record(
            actor,
            ActionKind::VersionPublished,
            None,
            None,
            format!("version '{name}' published: {preview}..."),
        );
    }

    /// Append a feedback entry to the QA trail (and a matching audit event).
    pub fn log_feedback(&mut self, record: FeedbackRecord) {
        let preview: String = record.comment.chars().take(60).collect();
        let detail = format!(
            "{} feedback from {}: {preview}...",
            record.kind, record.actor
        );
        let actor = record.actor.clone();
        self.feedback.push(record);
        self.record(&actor, ActionKind::FeedbackLogged, None, None, detail);
    }

    /// Increment the shared transient-failure counter and return it.
    pub fn bump_retry(&mut self, actor: &str, context: &str) -> u32 {
        self.retry_count += 1;
        let count = self.retry_count;
        self.record(
            actor,
            ActionKind::RetryIncremented,
            None,
            None,
            format!("retry count now {count} for {context}"),
        );
        count
    }

    /// Zero the transient-failure counter after a successful step.
    pub fn reset_retry(&mut self, actor: &str, context: &str) {
        if self.retry_count == 0 {
            return;
        }
        let previous = self.retry_count;
        self.retry_count = 0;
        self.record(
            actor,
            ActionKind::RetryReset,
            None,
            None,
            format!("retry count reset from {previous} after successful step: {context}"),
        );
    }

    /// Increment the revision counter for `stage_key` and return it.
    /// Counters are independent per key and never reset.
    pub fn bump_revision(&mut self, stage_key: &str, actor: &str) -> u32 {
        let counter = self.revision_counts.entry(stage_key.to_string()).or_insert(0);
        *counter += 1;
        let count = *counter;
        self.record(
            actor,
            ActionKind::RevisionIncremented,
            None,
            None,
            format!("revision count for '{stage_key}' now {count}"),
        );
        count
    }

    pub fn revision_count(&self, stage_key: &str) -> u32 {
        self.revision_counts.get(stage_key).copied().unwrap_or(0)
    }

    /// Record which revision counter the pending rework is charged against.
    pub fn set_revision_request_key(&mut self, key: &str) {
        self.settings.last_revision_request_key = Some(key.to_string());
    }

    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }

    /// First existing version from a preference-ordered key list.
    pub fn select_version<'a>(&'a self, keys: &[String]) -> Option<(&'a str, &'a str)> {
        keys.iter().find_map(|key| {
            self.versions
                .get_key_value(key.as_str())
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
    }

    /// Note an escalation to manual review in the audit trail.
    pub fn note_escalation(&mut self, actor: &str, reason: &str) {
        self.record(
            actor,
            ActionKind::Escalated,
            None,
            None,
            format!("escalated for manual review: {reason}"),
        );
    }

    fn record(
        &mut self,
        actor: &str,
        action: ActionKind,
        previous_state: Option<TaskState>,
        new_state: Option<TaskState>,
        details: String,
    ) {
        self.updated_at = Utc::now();
        self.history.push(HistoryEvent {
            timestamp: self.updated_at,
            actor: actor.to_string(),
            action,
            previous_state,
            new_state,
            details,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::state::{Direction, Stage};

    fn make_task() -> TranslationTask {
        TranslationTask::new(
            "task_001",
            "The early bird gets the worm, eh?",
            "EN_CA",
            "FR_CA",
            TaskSettings::default(),
        )
    }

    #[test]
    fn creation_seeds_original_version_and_history() {
        let task = make_task();
        assert_eq!(task.current_state, TaskState::Uploaded);
        assert_eq!(
            task.version("original"),
            Some("The early bird gets the worm, eh?")
        );
        assert_eq!(task.history.len(), 1);
        assert_eq!(task.history[0].action, ActionKind::TaskCreated);
        assert_eq!(task.retry_count, 0);
        assert!(task.revision_counts.is_empty());
    }

    #[test]
    fn locales_are_normalized() {
        let task = TranslationTask::new("t", "x", "en_ca", "fr_ca", TaskSettings::default());
        assert_eq!(task.source_language, "EN_CA");
        assert_eq!(task.direction(), Some(Direction::EnToFrCa));
    }

    #[test]
    fn transition_records_previous_and_new_state() {
        let mut task = make_task();
        let pending = TaskState::pending(Direction::EnToFrCa, Stage::Translation);
        task.transition(pending, "ProjectManager", "initial routing");

        assert_eq!(task.current_state, pending);
        let event = task.history.last().unwrap();
        assert_eq!(event.action, ActionKind::StateChange);
        assert_eq!(event.previous_state, Some(TaskState::Uploaded));
        assert_eq!(event.new_state, Some(pending));
    }

    #[test]
    fn terminal_failure_captures_reason() {
        let mut task = make_task();
        task.transition(
            TaskState::MaxRetriesExceeded,
            "WorkflowEngine",
            "max retries for grammar review",
        );
        assert_eq!(
            task.failure_reason.as_deref(),
            Some("max retries for grammar review")
        );

        // The first reason wins.
        task.transition(TaskState::UnknownFailure, "WorkflowEngine", "later");
        assert_eq!(
            task.failure_reason.as_deref(),
            Some("max retries for grammar review")
        );
    }

    #[test]
    fn completion_sets_no_failure_reason() {
        let mut task = make_task();
        task.transition(
            TaskState::Completed(Direction::EnToFrCa),
            "FinalQualityGate_FRCA",
            "final review passed",
        );
        assert!(task.failure_reason.is_none());
    }

    #[test]
    fn publish_version_upserts() {
        let mut task = make_task();
        task.publish_version("initial_translation_frca", "v1", "Translator");
        task.publish_version("initial_translation_frca", "v2", "Translator");
        assert_eq!(task.version("initial_translation_frca"), Some("v2"));

        let published = task
            .history
            .iter()
            .filter(|e| e.action == ActionKind::VersionPublished)
            .count();
        assert_eq!(published, 2);
    }

    #[test]
    fn retry_counter_bumps_and_resets() {
        let mut task = make_task();
        assert_eq!(task.bump_retry("WorkflowEngine", "FRCA grammar"), 1);
        assert_eq!(task.bump_retry("WorkflowEngine", "FRCA grammar"), 2);
        task.reset_retry("GrammarSpecialist", "FRCA grammar");
        assert_eq!(task.retry_count, 0);

        // Resetting an already-zero counter leaves no trace.
        let events = task.history.len();
        task.reset_retry("GrammarSpecialist", "FRCA grammar");
        assert_eq!(task.history.len(), events);
    }

    #[test]
    fn revision_counters_are_independent() {
        let mut task = make_task();
        assert_eq!(task.bump_revision("frca_style", "FinalQualityGate_FRCA"), 1);
        assert_eq!(
            task.bump_revision("frca_style_by_final", "FinalQualityGate_FRCA"),
            1
        );
        assert_eq!(
            task.bump_revision("frca_style_by_final", "FinalQualityGate_FRCA"),
            2
        );
        assert_eq!(task.revision_count("frca_style"), 1);
        assert_eq!(task.revision_count("frca_style_by_final"), 2);
        assert_eq!(task.revision_count("frca_nuance"), 0);
    }

    #[test]
    fn feedback_is_appended_with_audit_event() {
        let mut task = make_task();
        task.log_feedback(FeedbackRecord::revision(
            "FRCA_GrammarSpecialist",
            Stage::Grammar,
            "GrammarFRCA",
            "2 issues found".to_string(),
            TaskState::revision(Direction::EnToFrCa, Stage::Translation),
            Vec::new(),
        ));
        assert_eq!(task.feedback.len(), 1);
        assert_eq!(
            task.feedback[0].requested_action,
            RequestedAction::RevisionNeeded
        );
        assert_eq!(
            task.feedback[0].target_revision_state,
            Some(TaskState::revision(Direction::EnToFrCa, Stage::Translation))
        );
        assert_eq!(
            task.history.last().unwrap().action,
            ActionKind::FeedbackLogged
        );
    }

    #[test]
    fn select_version_honors_preference_order() {
        let mut task = make_task();
        task.publish_version("grammar_corrected_frca", "base", "GrammarSpecialist");
        let keys = vec![
            "grammar_corrected_frca_rev".to_string(),
            "grammar_corrected_frca".to_string(),
        ];
        assert_eq!(
            task.select_version(&keys),
            Some(("grammar_corrected_frca", "base"))
        );

        task.publish_version("grammar_corrected_frca_rev", "revised", "GrammarSpecialist");
        assert_eq!(
            task.select_version(&keys),
            Some(("grammar_corrected_frca_rev", "revised"))
        );
        assert_eq!(task.select_version(&["missing".to_string()]), None);
    }

    #[test]
    fn task_serialization_roundtrip() {
        let mut task = make_task();
        task.publish_version("initial_translation_frca", "draft", "Translator");
        let json = serde_json::to_string(&task).unwrap();
        let parsed: TranslationTask = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, task.id);
        assert_eq!(parsed.current_state, TaskState::Uploaded);
        assert_eq!(parsed.version("initial_translation_frca"), Some("draft"));
    }
}
