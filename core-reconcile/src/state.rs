//! # Per-File State Machine
//!
//! Every file an automated run touches walks this machine; transitions are
//! validated so a bug in the pipeline surfaces as an error instead of a
//! file silently reported in the wrong state.
//!
//! ```text
//! Idle → Reading → Searching ─→ NoCandidate → Skipped
//!                      │
//!                      └→ CandidateFound → Scoring ─→ Accepted → Writing → Applied
//!                              ↑                 │                   └──→ Failed
//!                              └── (once) ── Rejected → Skipped
//! ```
//!
//! Any non-terminal state may move to `Failed`. Manual edits go straight
//! from `Idle` to `Writing`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use core_metadata::FormatCorrection;

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Idle,
    Reading,
    Searching,
    NoCandidate,
    CandidateFound,
    Scoring,
    Accepted,
    Rejected,
    Writing,
    Applied,
    Skipped,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Idle => "idle",
            FileState::Reading => "reading",
            FileState::Searching => "searching",
            FileState::NoCandidate => "no_candidate",
            FileState::CandidateFound => "candidate_found",
            FileState::Scoring => "scoring",
            FileState::Accepted => "accepted",
            FileState::Rejected => "rejected",
            FileState::Writing => "writing",
            FileState::Applied => "applied",
            FileState::Skipped => "skipped",
            FileState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Applied | FileState::Skipped | FileState::Failed
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one file through the pipeline.
#[derive(Debug, Clone)]
pub struct FileStateMachine {
    state: FileState,
    history: Vec<FileState>,
    fallback_used: bool,
}

impl Default for FileStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStateMachine {
    pub fn new() -> Self {
        Self {
            state: FileState::Idle,
            history: vec![FileState::Idle],
            fallback_used: false,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn history(&self) -> &[FileState] {
        &self.history
    }

    /// Moves to `to`.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the edge is not in the machine, or when
    /// a second fallback from `Rejected` is attempted.
    pub fn transition(&mut self, to: FileState) -> Result<()> {
        let valid = match (self.state, to) {
            (from, FileState::Failed) => !from.is_terminal(),

            (FileState::Idle, FileState::Reading) => true,
            (FileState::Idle, FileState::Writing) => true,
            (FileState::Reading, FileState::Searching) => true,
            (FileState::Searching, FileState::NoCandidate) => true,
            (FileState::Searching, FileState::CandidateFound) => true,
            (FileState::NoCandidate, FileState::Skipped) => true,
            (FileState::CandidateFound, FileState::Scoring) => true,
            (FileState::CandidateFound, FileState::Rejected) => true,
            (FileState::Scoring, FileState::Accepted) => true,
            (FileState::Scoring, FileState::Rejected) => true,
            (FileState::Accepted, FileState::Writing) => true,
            (FileState::Writing, FileState::Applied) => true,
            (FileState::Rejected, FileState::Skipped) => true,
            (FileState::Rejected, FileState::CandidateFound) => !self.fallback_used,

            _ => false,
        };

        if !valid {
            return Err(ReconcileError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        if self.state == FileState::Rejected && to == FileState::CandidateFound {
            self.fallback_used = true;
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Moves to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = FileState::Failed;
            self.history.push(FileState::Failed);
        }
    }
}

/// Terminal result of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Applied,
    Skipped,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Applied => "applied",
            FileStatus::Skipped => "skipped",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one file in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Path as submitted
    pub path: PathBuf,
    pub status: FileStatus,
    /// Score of the last candidate considered
    pub score: Option<u8>,
    /// Error text, verbatim, for failed files; reason for skipped ones
    pub message: Option<String>,
    /// Where the file lives now, when a post-write rename moved it
    pub renamed_to: Option<PathBuf>,
    pub lyric_sidecar: Option<PathBuf>,
    pub format_correction: Option<FormatCorrection>,
}

impl FileOutcome {
    pub fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            score: None,
            message: None,
            renamed_to: None,
            lyric_sidecar: None,
            format_correction: None,
        }
    }

    pub fn failed(path: &Path, message: impl Into<String>) -> Self {
        let mut outcome = Self::new(path, FileStatus::Failed);
        outcome.message = Some(message.into());
        outcome
    }

    pub fn skipped(path: &Path, message: impl Into<String>) -> Self {
        let mut outcome = Self::new(path, FileStatus::Skipped);
        outcome.message = Some(message.into());
        outcome
    }

    pub fn with_score(mut self, score: Option<u8>) -> Self {
        self.score = score;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(machine: &mut FileStateMachine, states: &[FileState]) {
        for state in states {
            machine.transition(*state).unwrap();
        }
    }

    #[test]
    fn test_happy_path() {
        let mut machine = FileStateMachine::new();
        walk(
            &mut machine,
            &[
                FileState::Reading,
                FileState::Searching,
                FileState::CandidateFound,
                FileState::Scoring,
                FileState::Accepted,
                FileState::Writing,
                FileState::Applied,
            ],
        );
        assert_eq!(machine.state(), FileState::Applied);
        assert_eq!(machine.history().len(), 8);
    }

    #[test]
    fn test_no_candidate_path() {
        let mut machine = FileStateMachine::new();
        walk(
            &mut machine,
            &[
                FileState::Reading,
                FileState::Searching,
                FileState::NoCandidate,
                FileState::Skipped,
            ],
        );
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_single_fallback_allowed() {
        let mut machine = FileStateMachine::new();
        walk(
            &mut machine,
            &[
                FileState::Reading,
                FileState::Searching,
                FileState::CandidateFound,
                FileState::Scoring,
                FileState::Rejected,
                FileState::CandidateFound,
                FileState::Scoring,
                FileState::Rejected,
            ],
        );

        let err = machine.transition(FileState::CandidateFound).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidStateTransition { .. }));
        machine.transition(FileState::Skipped).unwrap();
    }

    #[test]
    fn test_unfetchable_candidate_is_rejected_without_scoring() {
        let mut machine = FileStateMachine::new();
        walk(
            &mut machine,
            &[
                FileState::Reading,
                FileState::Searching,
                FileState::CandidateFound,
                FileState::Rejected,
                FileState::CandidateFound,
                FileState::Scoring,
                FileState::Accepted,
                FileState::Writing,
                FileState::Applied,
            ],
        );
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = FileStateMachine::new();
        assert!(machine.transition(FileState::Applied).is_err());
        assert!(machine.transition(FileState::Scoring).is_err());

        walk(&mut machine, &[FileState::Reading, FileState::Searching]);
        assert!(machine.transition(FileState::Writing).is_err());
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let mut machine = FileStateMachine::new();
        walk(&mut machine, &[FileState::Reading]);
        machine.transition(FileState::Failed).unwrap();
        assert_eq!(machine.state(), FileState::Failed);

        // terminal states stay put
        assert!(machine.transition(FileState::Failed).is_err());
        machine.fail();
        assert_eq!(machine.history().last(), Some(&FileState::Failed));
        assert_eq!(
            machine
                .history()
                .iter()
                .filter(|s| **s == FileState::Failed)
                .count(),
            1
        );
    }

    #[test]
    fn test_manual_edit_path() {
        let mut machine = FileStateMachine::new();
        walk(&mut machine, &[FileState::Writing, FileState::Applied]);
        assert_eq!(machine.state(), FileState::Applied);
    }
}
