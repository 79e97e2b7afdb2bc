//! # Batch Coordinator
//!
//! Runs one batch of files at a time on a background task.
//!
//! ## Overview
//!
//! [`ReconcileCoordinator::submit`] takes a [`BatchSpec`] and returns a
//! [`BatchHandle`] right away. The run processes files strictly in list
//! order; each file ends in exactly one [`FileOutcome`] and a failing file
//! never stops the run.
//!
//! Only one run may be active. A second `submit` while one is running fails
//! with [`ReconcileError::RunInProgress`].
//!
//! Cancellation is checked between files. A file already in flight, including
//! its write, finishes first; files never reached are not reported.
//!
//! A panic while processing a file is caught at the file boundary and
//! recorded as `Failed`. The single-run slot is released even if the worker
//! itself dies.
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_reconcile::{BatchSpec, ReconcileCoordinator};
//!
//! # async fn example(coordinator: ReconcileCoordinator, files: Vec<std::path::PathBuf>) -> core_reconcile::Result<()> {
//! let mut handle = coordinator.submit(BatchSpec::auto_complete(files)).await?;
//!
//! while let Some(progress) = handle.next_progress().await {
//!     println!("{}% {}", progress.percent(), progress.outcome.path.display());
//! }
//!
//! let report = handle.wait().await?;
//! println!("{} applied, {} failed", report.applied(), report.failed());
//! # Ok(())
//! # }
//! ```

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use core_runtime::config::TaggerConfig;
use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
use core_runtime::logging::strip_path;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::edit::BatchEdit;
use crate::error::{ReconcileError, Result};
use crate::pipeline::ReconcilePipeline;
use crate::state::{FileOutcome, FileStatus};

/// Unique identifier for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ReconcileError::InvalidRunId(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchMode {
    /// Search, score and apply unattended
    AutoComplete,
    /// Apply the same hand-entered fields to every file
    Edit(BatchEdit),
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::AutoComplete => "auto_complete",
            BatchMode::Edit(_) => "edit",
        }
    }
}

/// Files to process and what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpec {
    pub files: Vec<PathBuf>,
    pub mode: BatchMode,
}

impl BatchSpec {
    pub fn auto_complete(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            mode: BatchMode::AutoComplete,
        }
    }

    pub fn edit(files: Vec<PathBuf>, edit: BatchEdit) -> Self {
        Self {
            files,
            mode: BatchMode::Edit(edit),
        }
    }
}

/// One finished file, streamed while the run is in progress.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub run_id: RunId,
    /// Files finished so far, this one included
    pub processed: usize,
    pub total: usize,
    pub outcome: FileOutcome,
}

impl BatchProgress {
    pub fn percent(&self) -> u8 {
        percent(self.processed, self.total)
    }
}

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: RunId,
    /// One entry per processed file, in submission order
    pub outcomes: Vec<FileOutcome>,
    /// True when the run stopped before reaching every file
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.count(FileStatus::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.count(FileStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    fn count(&self, status: FileStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Caller's side of a submitted run.
pub struct BatchHandle {
    run_id: RunId,
    token: CancellationToken,
    progress_rx: mpsc::UnboundedReceiver<BatchProgress>,
    join: JoinHandle<BatchReport>,
}

impl BatchHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Requests cancellation. Takes effect before the next file.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Next finished file, or `None` once the run is over and every progress
    /// message has been received.
    pub async fn next_progress(&mut self) -> Option<BatchProgress> {
        self.progress_rx.recv().await
    }

    /// Waits for the run to finish.
    ///
    /// # Errors
    ///
    /// `Worker` when the background task panicked or was aborted.
    pub async fn wait(self) -> Result<BatchReport> {
        self.join
            .await
            .map_err(|e| ReconcileError::Worker(e.to_string()))
    }
}

#[derive(Clone)]
struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
}

type ActiveSlot = Arc<Mutex<Option<ActiveRun>>>;

/// Frees the single-run slot when the worker finishes or unwinds.
struct SlotGuard {
    active: ActiveSlot,
    run_id: RunId,
    armed: bool,
}

impl SlotGuard {
    fn new(active: ActiveSlot, run_id: RunId) -> Self {
        Self {
            active,
            run_id,
            armed: true,
        }
    }

    async fn release(mut self) {
        clear_slot(&mut *self.active.lock().await, self.run_id);
        self.armed = false;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut active) = self.active.try_lock() {
            clear_slot(&mut active, self.run_id);
            return;
        }
        // Someone holds the lock right now; finish the release off-thread.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let active = Arc::clone(&self.active);
            let run_id = self.run_id;
            runtime.spawn(async move {
                clear_slot(&mut *active.lock().await, run_id);
            });
        }
    }
}

fn clear_slot(active: &mut Option<ActiveRun>, run_id: RunId) {
    if active.as_ref().map(|run| run.run_id) == Some(run_id) {
        *active = None;
    }
}

/// Owns the single-run slot and spawns batch workers.
#[derive(Clone)]
pub struct ReconcileCoordinator {
    pipeline: Arc<ReconcilePipeline>,
    event_bus: EventBus,
    active: ActiveSlot,
}

impl ReconcileCoordinator {
    /// Per-file events from `pipeline` are published on `event_bus` as well.
    pub fn new(pipeline: ReconcilePipeline, event_bus: EventBus) -> Self {
        Self {
            pipeline: Arc::new(pipeline.with_event_bus(event_bus.clone())),
            event_bus,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &TaggerConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = ReconcilePipeline::from_config(config)?;
        Ok(Self::new(pipeline, EventBus::new(config.event_buffer_size)))
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Pipeline for interactive, single-file use.
    pub fn pipeline(&self) -> &Arc<ReconcilePipeline> {
        &self.pipeline
    }

    pub async fn active_run(&self) -> Option<RunId> {
        self.active.lock().await.as_ref().map(|run| run.run_id)
    }

    /// Starts a batch run in the background.
    ///
    /// # Errors
    ///
    /// `RunInProgress` when another run has not finished yet.
    #[instrument(skip(self, spec), fields(files = spec.files.len(), mode = spec.mode.as_str()))]
    pub async fn submit(&self, spec: BatchSpec) -> Result<BatchHandle> {
        let mut active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            return Err(ReconcileError::RunInProgress {
                run_id: run.run_id.to_string(),
            });
        }

        let run_id = RunId::new();
        let token = CancellationToken::new();
        *active = Some(ActiveRun {
            run_id,
            token: token.clone(),
        });
        drop(active);

        self.event_bus
            .emit(CoreEvent::Batch(BatchEvent::Started {
                run_id: run_id.to_string(),
                mode: spec.mode.as_str().to_string(),
                total_files: spec.files.len() as u64,
            }))
            .ok();

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let worker = BatchWorker {
            pipeline: Arc::clone(&self.pipeline),
            event_bus: self.event_bus.clone(),
            slot: SlotGuard::new(Arc::clone(&self.active), run_id),
            run_id,
            token: token.clone(),
            progress_tx,
        };
        let join = tokio::spawn(worker.run(spec));

        info!("Started batch run {}", run_id);

        Ok(BatchHandle {
            run_id,
            token,
            progress_rx,
            join,
        })
    }

    /// Requests cancellation of the active run.
    ///
    /// # Errors
    ///
    /// `RunNotFound` when `run_id` is not the active run.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn cancel(&self, run_id: RunId) -> Result<()> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(run) if run.run_id == run_id => {
                run.token.cancel();
                info!("Cancellation requested for batch run {}", run_id);
                Ok(())
            }
            _ => Err(ReconcileError::RunNotFound {
                run_id: run_id.to_string(),
            }),
        }
    }
}

struct BatchWorker {
    pipeline: Arc<ReconcilePipeline>,
    event_bus: EventBus,
    slot: SlotGuard,
    run_id: RunId,
    token: CancellationToken,
    progress_tx: mpsc::UnboundedSender<BatchProgress>,
}

impl BatchWorker {
    #[instrument(skip(self, spec), fields(run_id = %self.run_id))]
    async fn run(self, spec: BatchSpec) -> BatchReport {
        let started = Instant::now();
        let run_id = self.run_id.to_string();
        let total = spec.files.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        for path in &spec.files {
            if self.token.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = self.process(path, &spec.mode, &run_id).await;
            if outcome.status == FileStatus::Failed {
                error!(
                    file = %strip_path(&path.to_string_lossy()),
                    message = outcome.message.as_deref().unwrap_or_default(),
                    "File failed"
                );
            }

            outcomes.push(outcome.clone());
            let processed = outcomes.len();

            self.event_bus
                .emit(CoreEvent::Batch(BatchEvent::Progress {
                    run_id: run_id.clone(),
                    processed: processed as u64,
                    total: total as u64,
                    percent: percent(processed, total),
                    current_path: path.display().to_string(),
                }))
                .ok();
            self.progress_tx
                .send(BatchProgress {
                    run_id: self.run_id,
                    processed,
                    total,
                    outcome,
                })
                .ok();
        }

        let report = BatchReport {
            run_id: self.run_id,
            outcomes,
            cancelled,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.slot.release().await;

        let event = if cancelled {
            info!(
                "Batch run {} cancelled after {} of {} files",
                run_id,
                report.outcomes.len(),
                total
            );
            BatchEvent::Cancelled {
                run_id,
                processed: report.outcomes.len() as u64,
            }
        } else {
            info!(
                "Batch run {} completed: {} applied, {} skipped, {} failed",
                run_id,
                report.applied(),
                report.skipped(),
                report.failed()
            );
            BatchEvent::Completed {
                run_id,
                applied: report.applied() as u64,
                skipped: report.skipped() as u64,
                failed: report.failed() as u64,
                duration_ms: report.duration_ms,
            }
        };
        self.event_bus.emit(CoreEvent::Batch(event)).ok();

        report
    }
}

impl BatchWorker {
    /// Runs one file, turning a panic into a `Failed` outcome.
    async fn process(&self, path: &Path, mode: &BatchMode, run_id: &str) -> FileOutcome {
        let work = async {
            match mode {
                BatchMode::AutoComplete => self.pipeline.auto_complete(path, Some(run_id)).await,
                BatchMode::Edit(edit) => self.pipeline.apply_edit(path, edit, Some(run_id)).await,
            }
        };

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let outcome = FileOutcome::failed(
                    path,
                    format!("Internal error: {}", panic_message(panic.as_ref())),
                );
                self.pipeline.emit_outcome(Some(run_id), &outcome);
                outcome
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "file processing panicked".to_string()
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed * 100) / total).min(100) as u8
}
