use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Batch run {run_id} is already in progress")]
    RunInProgress { run_id: String },

    #[error("Batch run {run_id} not found")]
    RunNotFound { run_id: String },

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Metadata(#[from] core_metadata::MetadataError),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch worker stopped unexpectedly: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
