//! # Reconcile Pipeline
//!
//! Per-file orchestration on top of [`TagCodec`], a [`CatalogClient`] and the
//! [`MatchScorer`].
//!
//! Two flows share the same parts:
//!
//! - **Interactive**: [`open`](ReconcilePipeline::open),
//!   [`search`](ReconcilePipeline::search),
//!   [`inspect`](ReconcilePipeline::inspect) and
//!   [`apply`](ReconcilePipeline::apply) are called one by one by a host
//!   that shows the score and lets a person decide.
//! - **Automatic**: [`auto_complete`](ReconcilePipeline::auto_complete) walks
//!   one file through the [`FileStateMachine`], accepting a candidate only at
//!   or above the threshold and trying the second-ranked candidate once.
//!
//! Neither flow lets an error escape a single file: `auto_complete` and
//! `apply_edit` always return a [`FileOutcome`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_metadata::{
    CatalogClient, CoverSource, FileRecord, MatchScorer, SearchCandidate, SongMetadata,
    TagCodec, WriteReport,
};
use core_runtime::config::TaggerConfig;
use core_runtime::events::{CoreEvent, EventBus, FileEvent};
use tracing::{debug, info, instrument, warn};

use crate::edit::BatchEdit;
use crate::error::Result;
use crate::keyword::derive_keyword;
use crate::post_write::{rename_to_metadata, save_lyric_sidecar};
use crate::state::{FileOutcome, FileState, FileStateMachine, FileStatus};

/// Candidates considered per file in the automatic flow: the best one plus a
/// single fallback.
const MAX_CANDIDATES: usize = 2;

/// Post-write and acceptance settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub auto_rename: bool,
    pub auto_lyric: bool,
    pub lyric_dir: Option<PathBuf>,
    pub accept_threshold: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            auto_rename: false,
            auto_lyric: false,
            lyric_dir: None,
            accept_threshold: core_metadata::scoring::ACCEPT_THRESHOLD,
        }
    }
}

impl From<&TaggerConfig> for PipelineOptions {
    fn from(config: &TaggerConfig) -> Self {
        Self {
            auto_rename: config.auto_rename,
            auto_lyric: config.auto_lyric,
            lyric_dir: config.lyric_dir.clone(),
            accept_threshold: config.accept_threshold,
        }
    }
}

/// A file as opened for interactive reconciliation.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub metadata: SongMetadata,
    pub record: FileRecord,
    /// Suggested search keyword
    pub keyword: String,
}

/// Full candidate metadata with its score against the local file.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub metadata: SongMetadata,
    pub score: u8,
    /// Whether the automatic flow would accept it
    pub accepted: bool,
}

/// Result of a write plus its post-write steps.
#[derive(Debug, Clone)]
pub struct AppliedWrite {
    pub report: WriteReport,
    /// Where the file lives after an optional rename
    pub final_path: PathBuf,
    pub lyric_sidecar: Option<PathBuf>,
}

impl AppliedWrite {
    pub fn renamed(&self, original: &Path) -> Option<&Path> {
        (self.final_path != original).then_some(self.final_path.as_path())
    }
}

pub struct ReconcilePipeline {
    codec: TagCodec,
    catalog: Arc<dyn CatalogClient>,
    scorer: MatchScorer,
    options: PipelineOptions,
    event_bus: Option<EventBus>,
}

impl ReconcilePipeline {
    pub fn new(catalog: Arc<dyn CatalogClient>, options: PipelineOptions) -> Self {
        Self {
            codec: TagCodec::new(),
            catalog,
            scorer: MatchScorer::new(options.accept_threshold),
            options,
            event_bus: None,
        }
    }

    /// Builds the pipeline with the catalog selected in `config`.
    pub fn from_config(config: &TaggerConfig) -> Result<Self> {
        let catalog = core_metadata::build_catalog_client(config)?;
        Ok(Self::new(catalog, PipelineOptions::from(config)))
    }

    /// Publishes per-file events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogClient> {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Interactive flow
    // ------------------------------------------------------------------

    /// Reads the file and suggests a keyword.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn open(&self, path: &Path) -> Result<LocalTrack> {
        let (metadata, record) = self.codec.read(path).await?;
        let keyword = derive_keyword(&metadata, path);
        Ok(LocalTrack {
            metadata,
            record,
            keyword,
        })
    }

    pub async fn search(&self, keyword: &str, page: u32) -> Result<Vec<SearchCandidate>> {
        Ok(self.catalog.search(keyword, page).await?)
    }

    /// Fetches a candidate and scores it. The threshold is reported, not
    /// enforced.
    #[instrument(skip(self, local))]
    pub async fn inspect(&self, provider_key: &str, local: &SongMetadata) -> Result<ScoredCandidate> {
        let metadata = self.catalog.fetch_full(provider_key).await?;
        let score = self.scorer.score(local, &metadata);
        debug!(score, "Scored candidate");
        Ok(ScoredCandidate {
            metadata,
            score,
            accepted: self.scorer.accepts(score),
        })
    }

    /// Writes `metadata`, then renames and saves lyrics as configured.
    ///
    /// Lyrics need `provider_key`; without one the sidecar step is skipped.
    ///
    /// # Errors
    ///
    /// Only the tag write can fail the call. Rename and sidecar failures are
    /// logged and leave `final_path` / `lyric_sidecar` unchanged.
    #[instrument(skip(self, metadata, cover), fields(path = %path.display()))]
    pub async fn apply(
        &self,
        path: &Path,
        provider_key: Option<&str>,
        metadata: &SongMetadata,
        cover: &CoverSource,
    ) -> Result<AppliedWrite> {
        let report = self.write(path, metadata, cover).await?;
        Ok(self.post_write(path, provider_key, metadata, report).await)
    }

    // ------------------------------------------------------------------
    // Automatic flow
    // ------------------------------------------------------------------

    /// Reconciles one file unattended.
    ///
    /// No candidate → `Skipped`. Best score below the threshold after the
    /// fallback → `Skipped`. A candidate whose details are gone counts as
    /// rejected. Any other error → `Failed` with the error text.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn auto_complete(&self, path: &Path, run_id: Option<&str>) -> FileOutcome {
        let mut run = FileRun::new(path, run_id);

        let outcome = match self.drive_auto(&mut run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, state = %run.machine.state(), "File failed");
                run.machine.fail();
                self.emit_state(&run);
                FileOutcome::failed(path, e.to_string()).with_score(run.score)
            }
        };

        self.emit_outcome(run_id, &outcome);
        outcome
    }

    async fn drive_auto(&self, run: &mut FileRun<'_>) -> Result<FileOutcome> {
        let path = run.path;

        self.step(run, FileState::Reading)?;
        let (local, record) = self.codec.read(path).await?;
        debug!(hash = %record.content_hash, container = %record.detected_container, "Read local tags");

        self.step(run, FileState::Searching)?;
        let keyword = derive_keyword(&local, path);
        let candidates = match self.catalog.search(&keyword, 0).await {
            Ok(candidates) => candidates,
            Err(e) if e.is_no_results() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if candidates.is_empty() {
            self.step(run, FileState::NoCandidate)?;
            self.step(run, FileState::Skipped)?;
            info!(keyword = %keyword, "No candidates");
            return Ok(FileOutcome::skipped(
                path,
                format!("No candidates found for '{}'", keyword),
            ));
        }

        for candidate in candidates.iter().take(MAX_CANDIDATES) {
            self.step(run, FileState::CandidateFound)?;
            let full = match self.catalog.fetch_full(&candidate.provider_key).await {
                Ok(full) => full,
                Err(e) if e.is_no_results() => {
                    debug!(provider_key = %candidate.provider_key, "Candidate details unavailable");
                    self.step(run, FileState::Rejected)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            self.step(run, FileState::Scoring)?;
            let score = self.scorer.score(&local, &full);
            run.score = Some(score);
            debug!(
                provider_key = %candidate.provider_key,
                score,
                threshold = self.scorer.threshold(),
                "Scored candidate"
            );

            if !self.scorer.accepts(score) {
                self.step(run, FileState::Rejected)?;
                continue;
            }

            self.step(run, FileState::Accepted)?;
            self.step(run, FileState::Writing)?;
            let report = self.write(path, &full, &CoverSource::Embedded).await?;
            self.step(run, FileState::Applied)?;

            let applied = self
                .post_write(path, Some(&candidate.provider_key), &full, report)
                .await;
            return Ok(applied_outcome(path, run.score, applied));
        }

        self.step(run, FileState::Skipped)?;
        let message = match run.score {
            Some(score) => format!(
                "Best score {} below threshold {}",
                score,
                self.scorer.threshold()
            ),
            None => format!("No candidate details available for '{}'", keyword),
        };
        Ok(FileOutcome::skipped(path, message).with_score(run.score))
    }

    /// Applies a manual batch edit to one file. Never renames.
    #[instrument(skip(self, edit), fields(path = %path.display()))]
    pub async fn apply_edit(&self, path: &Path, edit: &BatchEdit, run_id: Option<&str>) -> FileOutcome {
        let mut run = FileRun::new(path, run_id);

        let result = async {
            self.step(&mut run, FileState::Writing)?;
            let report = self
                .write(path, &edit.to_metadata(), &edit.cover_source())
                .await?;
            self.step(&mut run, FileState::Applied)?;
            Ok::<_, crate::error::ReconcileError>(report)
        }
        .await;

        let outcome = match result {
            Ok(report) => {
                let mut outcome = FileOutcome::new(path, FileStatus::Applied);
                outcome.format_correction = report.format_correction;
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Edit failed");
                run.machine.fail();
                self.emit_state(&run);
                FileOutcome::failed(path, e.to_string())
            }
        };

        self.emit_outcome(run_id, &outcome);
        outcome
    }

    // ------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------

    async fn write(
        &self,
        path: &Path,
        metadata: &SongMetadata,
        cover: &CoverSource,
    ) -> Result<WriteReport> {
        let report = self.codec.write(path, metadata, cover).await?;

        if let Some(correction) = &report.format_correction {
            warn!(
                detected = %correction.detected,
                extension = %correction.original_extension,
                "Container differs from extension"
            );
            self.emit(FileEvent::FormatCorrected {
                path: path.display().to_string(),
                detected: correction.detected.to_string(),
                original_extension: correction.original_extension.clone(),
            });
        }

        info!(fields = report.fields_written.len(), "Wrote tags");
        Ok(report)
    }

    async fn post_write(
        &self,
        path: &Path,
        provider_key: Option<&str>,
        metadata: &SongMetadata,
        report: WriteReport,
    ) -> AppliedWrite {
        let mut final_path = path.to_path_buf();

        if self.options.auto_rename {
            match rename_to_metadata(path, metadata).await {
                Ok(Some(renamed)) => {
                    self.emit(FileEvent::Renamed {
                        from: path.display().to_string(),
                        to: renamed.display().to_string(),
                    });
                    final_path = renamed;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Rename failed"),
            }
        }

        let lyric_sidecar = match (self.options.auto_lyric, provider_key) {
            (true, Some(key)) => self.save_lyric(&final_path, key, metadata).await,
            _ => None,
        };

        AppliedWrite {
            report,
            final_path,
            lyric_sidecar,
        }
    }

    async fn save_lyric(&self, path: &Path, provider_key: &str, metadata: &SongMetadata) -> Option<PathBuf> {
        let lyric = match self.catalog.fetch_lyric(provider_key).await {
            Ok(lyric) => lyric,
            Err(e) if e.is_no_results() => {
                debug!("No lyric available");
                return None;
            }
            Err(core_metadata::MetadataError::Unsupported(_)) => return None,
            Err(e) => {
                warn!(error = %e, "Lyric download failed");
                return None;
            }
        };

        match save_lyric_sidecar(path, metadata, &lyric, self.options.lyric_dir.as_deref()).await {
            Ok(Some(sidecar)) => {
                self.emit(FileEvent::LyricSaved {
                    path: path.display().to_string(),
                    sidecar: sidecar.display().to_string(),
                });
                Some(sidecar)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Saving lyric sidecar failed");
                None
            }
        }
    }

    fn step(&self, run: &mut FileRun<'_>, to: FileState) -> Result<()> {
        run.machine.transition(to)?;
        self.emit_state(run);
        Ok(())
    }

    fn emit_state(&self, run: &FileRun<'_>) {
        self.emit(FileEvent::StateChanged {
            run_id: run.run_id.map(str::to_string),
            path: run.path.display().to_string(),
            state: run.machine.state().to_string(),
        });
    }

    pub(crate) fn emit_outcome(&self, run_id: Option<&str>, outcome: &FileOutcome) {
        self.emit(FileEvent::Outcome {
            run_id: run_id.map(str::to_string),
            path: outcome.path.display().to_string(),
            status: outcome.status.to_string(),
            score: outcome.score,
            message: outcome.message.clone(),
        });
    }

    fn emit(&self, event: FileEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::File(event)).ok();
        }
    }
}

struct FileRun<'a> {
    path: &'a Path,
    run_id: Option<&'a str>,
    machine: FileStateMachine,
    score: Option<u8>,
}

impl<'a> FileRun<'a> {
    fn new(path: &'a Path, run_id: Option<&'a str>) -> Self {
        Self {
            path,
            run_id,
            machine: FileStateMachine::new(),
            score: None,
        }
    }
}

fn applied_outcome(path: &Path, score: Option<u8>, applied: AppliedWrite) -> FileOutcome {
    let mut outcome = FileOutcome::new(path, FileStatus::Applied).with_score(score);
    outcome.renamed_to = applied.renamed(path).map(Path::to_path_buf);
    outcome.lyric_sidecar = applied.lyric_sidecar;
    outcome.format_correction = applied.report.format_correction;
    outcome
}
