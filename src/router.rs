use crate::state_machine::{
    Direction, RequestedAction, Stage, TaskState, TranslationTask,
};

/// Decides where a unit goes after successfully resolving a revision state.
///
/// The requesting stage is recovered from the feedback trail. Only the final
/// gate gets the unit back directly: it must re-run its whole checklist
/// after any single fix. An intermediate requester trusts a local fix and
/// the unit simply re-enters the linear flow right after the reworked stage,
/// which is exactly the requester's own review.
pub struct RevisionRouter;

impl RevisionRouter {
    /// `vacated` is the revision-pending state the unit just resolved;
    /// `resolved_stage` is the stage that did the rework.
    pub fn resolve(
        task: &TranslationTask,
        vacated: TaskState,
        direction: Direction,
        resolved_stage: Stage,
    ) -> TaskState {
        let requester = task.feedback.iter().rev().find(|fb| {
            fb.requested_action == RequestedAction::RevisionNeeded
                && fb.target_revision_state == Some(vacated)
        });

        match requester {
            Some(fb) if fb.issuing_stage == Some(Stage::FinalGate) => {
                TaskState::pending(direction, Stage::FinalGate)
            }
            _ => TaskState::linear_next(direction, resolved_stage),
        }
    }
}
