//! Workspace facade crate.
//!
//! Re-exports the tagging crates so a host application can depend on
//! `musictag-workspace` alone and enable `desktop-shims` for the reqwest HTTP
//! client.

pub use core_metadata as metadata;
pub use core_reconcile as reconcile;
pub use core_runtime as runtime;

pub use core_reconcile::{BatchSpec, ReconcileCoordinator, ReconcilePipeline};
pub use core_runtime::config::{ProviderKind, TaggerConfig};
