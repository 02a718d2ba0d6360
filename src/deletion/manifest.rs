//! The persisted deletion manifest and its confirmation receipt.
//!
//! The manifest is the only hand-off between planning and confirming. It is
//! written as pretty-printed JSON so it can be reviewed before approval.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeletionResult;
use crate::classify::ClassificationResult;
use crate::config::MatchPolicy;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Why an asset was proposed for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionReason {
    /// No reference names the asset.
    Unreferenced,
    /// Only commented-out references name the asset.
    CommentedOutOnly,
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionReason::Unreferenced => write!(f, "unreferenced"),
            DeletionReason::CommentedOutOnly => write!(f, "commented-out-only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size_bytes: u64,
    pub reason: DeletionReason,
}

/// The set of assets a user is asked to approve for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionManifest {
    pub version: u32,
    pub project: String,
    pub created_at: DateTime<Utc>,
    pub strict: bool,
    pub match_policy: MatchPolicy,
    pub total_bytes: u64,
    pub entries: Vec<ManifestEntry>,
}

impl DeletionManifest {
    /// Build a manifest listing every unused asset, in path order.
    pub fn from_classification(project: impl Into<String>, result: &ClassificationResult) -> Self {
        let entries: Vec<ManifestEntry> = result
            .unused
            .iter()
            .map(|asset| ManifestEntry {
                path: asset.path.clone(),
                size_bytes: asset.size_bytes,
                reason: if result.commented_only.contains_key(&asset.path) {
                    DeletionReason::CommentedOutOnly
                } else {
                    DeletionReason::Unreferenced
                },
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            project: project.into(),
            created_at: Utc::now(),
            strict: result.options.strict,
            match_policy: result.options.match_policy,
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            entries,
        }
    }

    pub fn read(path: &Path) -> DeletionResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: &Path) -> DeletionResult<()> {
        write_json(path, self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A file removed by a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedEntry {
    pub path: String,
    pub size_bytes: u64,
    /// Project-relative location of the safety copy, when one was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Record that a manifest has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationReceipt {
    /// `created_at` of the manifest this receipt belongs to.
    pub manifest_created_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
    pub backup: bool,
    pub deleted: Vec<DeletedEntry>,
    /// Manifest entries that were not deleted.
    pub skipped: Vec<String>,
}

impl ConfirmationReceipt {
    pub fn read(path: &Path) -> DeletionResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: &Path) -> DeletionResult<()> {
        write_json(path, self)
    }

    /// Returns true if this receipt confirms `manifest`.
    pub fn confirms(&self, manifest: &DeletionManifest) -> bool {
        self.manifest_created_at == manifest.created_at
    }

    pub fn deleted_bytes(&self) -> u64 {
        self.deleted.iter().map(|d| d.size_bytes).sum()
    }
}

/// `<manifest>.receipt.json`, next to the manifest.
pub fn receipt_path(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".receipt.json");
    manifest_path.with_file_name(name)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> DeletionResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Reference, ReferenceKind};
    use crate::classify::{classify, ClassifyOptions};
    use crate::inventory::Asset;
    use tempfile::TempDir;

    fn strict_result() -> ClassificationResult {
        let assets = vec![
            Asset::new("assets/Club.png", 300, "assets"),
            Asset::new("assets/old.png", 200, "assets"),
            Asset::new("assets/hero.png", 100, "assets"),
        ];
        let refs = vec![
            Reference::new("assets/Club.png", "src/main.ts", 1, true, ReferenceKind::ModuleImport),
            Reference::new("hero.png", "src/main.ts", 2, false, ReferenceKind::QuotedLiteral),
        ];
        classify(
            &assets,
            &refs,
            ClassifyOptions {
                strict: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_manifest_lists_unused_with_reasons() {
        let manifest = DeletionManifest::from_classification("game", &strict_result());
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert!(manifest.strict);
        assert_eq!(manifest.total_bytes, 500);

        let entries: Vec<_> = manifest
            .entries
            .iter()
            .map(|e| (e.path.as_str(), e.reason))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("assets/Club.png", DeletionReason::CommentedOutOnly),
                ("assets/old.png", DeletionReason::Unreferenced),
            ]
        );
    }

    #[test]
    fn test_manifest_file_is_readable_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = DeletionManifest::from_classification("game", &strict_result());
        manifest.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"reason\": \"commented-out-only\""));
        assert!(text.contains("\"match_policy\": \"dual\""));
        assert_eq!(DeletionManifest::read(&path).unwrap(), manifest);
    }

    #[test]
    fn test_receipt_path() {
        assert_eq!(
            receipt_path(Path::new("/p/.assetscope-manifest.json")),
            PathBuf::from("/p/.assetscope-manifest.json.receipt.json")
        );
    }

    #[test]
    fn test_receipt_matches_its_manifest_only() {
        let manifest = DeletionManifest::from_classification("game", &strict_result());
        let receipt = ConfirmationReceipt {
            manifest_created_at: manifest.created_at,
            confirmed_at: Utc::now(),
            backup: false,
            deleted: vec![DeletedEntry {
                path: "assets/old.png".into(),
                size_bytes: 200,
                backup_path: None,
            }],
            skipped: vec![],
        };
        assert!(receipt.confirms(&manifest));
        assert_eq!(receipt.deleted_bytes(), 200);

        let mut newer = manifest.clone();
        newer.created_at = manifest.created_at + chrono::Duration::seconds(1);
        assert!(!receipt.confirms(&newer));
    }
}
