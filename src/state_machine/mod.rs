pub mod state;
pub mod task;

pub use state::{Direction, Phase, Stage, TaskState};
pub use task::{
    ActionKind, FeedbackRecord, HistoryEvent, RequestedAction, TaskSettings, TranslationTask,
};
