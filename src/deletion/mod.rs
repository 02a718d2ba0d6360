//! Two-phase deletion of unused assets.
//!
//! `plan` writes a manifest and deletes nothing. `confirm`, issued separately,
//! removes exactly what the manifest lists and leaves a receipt beside it.

pub mod manifest;
pub mod planner;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::issues::{Issue, IssueKind};

pub use manifest::{
    receipt_path, ConfirmationReceipt, DeletedEntry, DeletionManifest, DeletionReason,
    ManifestEntry, MANIFEST_VERSION,
};
pub use planner::{DeletionOutcome, DeletionPlanner, DeletionState, DELETED_BACKUP_DIR};

/// Errors that stop a plan or confirm request.
#[derive(Error, Debug)]
pub enum DeletionError {
    /// Confirm was requested before any plan.
    #[error("No deletion manifest at {0}; run `assetscope plan-delete` first")]
    MissingManifest(PathBuf),

    /// The manifest already has a receipt.
    #[error("Manifest {path} was already confirmed at {confirmed_at}; run `assetscope plan-delete` again")]
    ManifestAlreadyConfirmed {
        path: PathBuf,
        confirmed_at: DateTime<Utc>,
    },

    #[error("Failed to access manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for deletion operations.
pub type DeletionResult<T> = Result<T, DeletionError>;

impl DeletionError {
    /// The error as a report entry.
    pub fn to_issue(&self) -> Issue {
        let message = self.to_string();
        match self {
            DeletionError::MissingManifest(path) => {
                Issue::at(IssueKind::MissingManifest, path.to_string_lossy(), message)
            }
            DeletionError::ManifestAlreadyConfirmed { path, .. } => Issue::at(
                IssueKind::ManifestAlreadyConfirmed,
                path.to_string_lossy(),
                message,
            ),
            DeletionError::Json(_) => Issue::new(IssueKind::InvalidManifest, None, message),
            DeletionError::Io(_) => Issue::new(IssueKind::RunFailure, None, message),
        }
    }
}
