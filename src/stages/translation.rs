use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::assessors::{AssessContext, Translator};
use crate::observe::{Level, WorkflowObserver};
use crate::router::RevisionRouter;
use crate::state_machine::{
    Direction, FeedbackRecord, Phase, Stage, TaskState, TranslationTask,
};

use super::{apply_suggestions, revision_request_for, take_input, StageProcessor};

/// Produces the initial draft, and reworks it when a reviewer sends the
/// unit back. A rework pass applies the requester's suggested fixes to the
/// previous draft instead of translating from scratch.
pub struct TranslationStage {
    translator: Arc<dyn Translator>,
    observer: Arc<dyn WorkflowObserver>,
}

impl TranslationStage {
    pub fn new(translator: Arc<dyn Translator>, observer: Arc<dyn WorkflowObserver>) -> Self {
        Self {
            translator,
            observer,
        }
    }

    fn actor(direction: Direction) -> &'static str {
        match direction {
            Direction::EnToFrCa => "EN_FRCA_InitialTranslator",
            Direction::FrCaToEn => "FRCA_EN_InitialTranslator",
        }
    }
}

#[async_trait]
impl StageProcessor for TranslationStage {
    fn stage(&self) -> Stage {
        Stage::Translation
    }

    fn input_contract(&self, direction: Direction, phase: Phase) -> Vec<String> {
        let draft = Stage::Translation.output_key(direction);
        match phase {
            Phase::Revision => vec![format!("{draft}_rev"), draft, "original".to_string()],
            _ => vec!["original".to_string()],
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
            "{direction} initial translation{}",
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

        let (kind, draft) = if is_revision {
            let findings = revision_request_for(task, vacated)
                .map(|fb| fb.findings.clone())
                .unwrap_or_default();
            let mut fixed = apply_suggestions(&input, &findings);
            fixed.push_str(match direction {
                Direction::EnToFrCa => " (révisé)",
                Direction::FrCaToEn => " (revised)",
            });
            ("InitialTranslation_RevisionAttempt", fixed)
        } else {
            let ctx = AssessContext::for_task(task, direction);
            let draft = self
                .translator
                .translate(&task.original_text, direction, &ctx)
                .await?;
            ("InitialTranslation", draft)
        };

        let mut output_key = Stage::Translation.output_key(direction);
        if is_revision {
            output_key.push_str("_rev");
        }
        task.publish_version(&output_key, draft, actor);
        task.log_feedback(FeedbackRecord::proceed(
            actor,
            Stage::Translation,
            kind,
            format!("{step} complete, draft published as '{output_key}'."),
        ));

        let next = if is_revision {
            RevisionRouter::resolve(task, vacated, direction, Stage::Translation)
        } else {
            TaskState::linear_next(direction, Stage::Translation)
        };
        task.transition(next, actor, format!("{step} complete."));
        Ok(())
    }
}
