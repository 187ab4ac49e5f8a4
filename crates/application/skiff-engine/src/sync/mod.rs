use skiff_core::formats::checksum_doc::DocumentError;
use skiff_core::{DiffError, SchemaError, TransportError};
use skiff_scanner::ScannerError;

pub mod engine;
pub mod report;

pub use engine::{DeployEngine, DeploymentPlan};
pub use report::{exclusion_args, ReportCollector};

/// High-level error type for deployment planning.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("remote manifest document is unusable: {0}")]
    Document(#[from] DocumentError),
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),
    #[error("change records failed validation: {0}")]
    Schema(#[from] SchemaError),
    #[error("local scan failed: {0}")]
    Scan(#[from] ScannerError),
}
