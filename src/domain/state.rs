//! Iteration state shared by the router and every tool handler of one run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path-keyed file contents produced by a run.
pub type FileMap = BTreeMap<String, String>;

/// A single file the agent asked to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Merge `incoming` over `current`, later entries winning on the same path.
///
/// Total: never fails, never removes a path.
pub fn merge_files(current: &FileMap, incoming: &[FileEntry]) -> FileMap {
    let mut next = current.clone();
    for entry in incoming {
        next.insert(entry.path.clone(), entry.content.clone());
    }
    next
}

/// Mutable accumulator for one run.
///
/// Once `summary` is non-empty the run is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationState {
    pub files: FileMap,
    pub summary: String,
}

impl IterationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a successful write batch into the current file map.
    pub fn merge_files(&mut self, incoming: &[FileEntry]) {
        self.files = merge_files(&self.files, incoming);
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    /// Termination predicate checked by the router before every iteration.
    pub fn is_complete(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}
