//! Domain types for a run: request, iteration state, history, and outcome.

mod history;
mod outcome;
mod run;
mod state;

pub use history::{ConversationTurn, build_conversation};
pub use outcome::{APOLOGY_MESSAGE, Fragment, MessageRole, MessageType, OutcomeRecord};
pub use run::{FRAGMENT_TITLE, RunRequest, RunResult, TriggerEvent};
pub use state::{FileEntry, FileMap, IterationState, merge_files};
