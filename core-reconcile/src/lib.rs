//! # Reconcile Module
//!
//! Matches local audio files against a remote catalog and writes the result.
//!
//! ## Overview
//!
//! - Derives a search keyword from tags or the file name
//! - Searches, fetches and scores candidates
//! - Writes accepted metadata, then optionally renames the file and saves a
//!   lyric sidecar
//! - Runs whole batches in the background with per-file isolation and
//!   cooperative cancellation
//!
//! ## Components
//!
//! - **File State Machine** (`state`): validated per-file transitions and outcomes
//! - **Pipeline** (`pipeline`): interactive steps and the unattended per-file flow
//! - **Coordinator** (`coordinator`): single active batch run, progress and cancellation
//! - **Post-write** (`post_write`): rename and lyric sidecar helpers
//! - **Batch Edit** (`edit`): hand-entered fields applied to many files

pub mod coordinator;
pub mod edit;
pub mod error;
pub mod keyword;
pub mod pipeline;
pub mod post_write;
pub mod state;

pub use coordinator::{
    BatchHandle, BatchMode, BatchProgress, BatchReport, BatchSpec, ReconcileCoordinator, RunId,
};
pub use edit::BatchEdit;
pub use error::{ReconcileError, Result};
pub use keyword::derive_keyword;
pub use pipeline::{AppliedWrite, LocalTrack, PipelineOptions, ReconcilePipeline, ScoredCandidate};
pub use state::{FileOutcome, FileState, FileStateMachine, FileStatus};
