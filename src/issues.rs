//! Non-fatal problems collected while a run makes progress.
//!
//! Scanning, extraction, compression and deletion never abort on a single bad
//! file. Instead they record an [`Issue`] and move on; every issue ends up in
//! the `errors` array of the final report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// A directory could not be read during traversal.
    UnreadableDirectory,
    /// A source or style file could not be read or parsed cleanly.
    UnparseableSourceFile,
    /// The compression service failed for one asset.
    CompressionFailure { reason: String },
    /// A confirm request found no manifest to act on.
    MissingManifest,
    /// A manifest entry no longer exists on disk.
    StaleManifestEntry,
    /// The safety copy of an asset could not be written; the asset was kept.
    BackupWriteFailure,
    /// Two inventory entries normalized to the same path.
    DuplicateAsset,
    /// Removing a file failed after its backup succeeded.
    DeleteFailure,
    /// A confirm request found a manifest that already has a receipt.
    ManifestAlreadyConfirmed,
    /// The manifest or its receipt could not be read or parsed.
    InvalidManifest,
    /// Files were deleted but the receipt recording them could not be written.
    ReceiptWriteFailure,
    /// The run stopped before producing results.
    RunFailure,
}

impl IssueKind {
    /// Returns a short label for the issue kind.
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::UnreadableDirectory => "unreadable-directory",
            IssueKind::UnparseableSourceFile => "unparseable-source",
            IssueKind::CompressionFailure { .. } => "compression-failure",
            IssueKind::MissingManifest => "missing-manifest",
            IssueKind::StaleManifestEntry => "stale-manifest-entry",
            IssueKind::BackupWriteFailure => "backup-write-failure",
            IssueKind::DuplicateAsset => "duplicate-asset",
            IssueKind::DeleteFailure => "delete-failure",
            IssueKind::ManifestAlreadyConfirmed => "manifest-already-confirmed",
            IssueKind::InvalidManifest => "invalid-manifest",
            IssueKind::ReceiptWriteFailure => "receipt-write-failure",
            IssueKind::RunFailure => "run-failure",
        }
    }
}

/// A single non-fatal problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub kind: IssueKind,
    /// Project-relative path the issue concerns, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl Issue {
    /// Creates a new issue and logs it as a warning.
    pub fn new(kind: IssueKind, path: Option<String>, message: impl Into<String>) -> Self {
        let issue = Self {
            kind,
            path,
            message: message.into(),
        };
        tracing::warn!("{}", issue);
        issue
    }

    /// Creates an issue tied to a path.
    pub fn at(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Some(path.into()), message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.kind.label(), path, self.message),
            None => write!(f, "[{}] {}", self.kind.label(), self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display_with_path() {
        let issue = Issue::at(IssueKind::StaleManifestEntry, "assets/a.png", "file is gone");
        assert_eq!(
            issue.to_string(),
            "[stale-manifest-entry] assets/a.png: file is gone"
        );
    }

    #[test]
    fn test_issue_serializes_flat_kind() {
        let issue = Issue::at(
            IssueKind::CompressionFailure {
                reason: "quota exceeded".to_string(),
            },
            "assets/a.png",
            "compression failed",
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "compression_failure");
        assert_eq!(json["reason"], "quota exceeded");
        assert_eq!(json["path"], "assets/a.png");
    }

    #[test]
    fn test_issue_without_path_omits_field() {
        let issue = Issue::new(IssueKind::MissingManifest, None, "no manifest");
        let json = serde_json::to_value(&issue).unwrap();
        assert!(json.get("path").is_none());
    }
}
