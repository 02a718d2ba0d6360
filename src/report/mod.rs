//! The final, immutable summary of a run.
//!
//! A [`Report`] is assembled once by [`ReportBuilder`] from the terminal state
//! of the inventory, compression and deletion stages.

pub mod size;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;
use crate::compress::{CompressionOutcome, CompressionRun};
use crate::deletion::{ConfirmationReceipt, DeletionManifest};
use crate::inventory::Asset;
use crate::issues::Issue;

pub use size::{format_size, saved_percentage, SizeSummary};

/// Which command produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMode {
    Analyze,
    Compress,
    PlanDelete,
    ConfirmDelete,
}

impl std::fmt::Display for ReportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportMode::Analyze => write!(f, "analyze"),
            ReportMode::Compress => write!(f, "compress"),
            ReportMode::PlanDelete => write!(f, "plan-delete"),
            ReportMode::ConfirmDelete => write!(f, "confirm-delete"),
        }
    }
}

/// A removed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub path: String,
    pub size_bytes: u64,
    pub size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// One asset in the used/unused listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedAsset {
    pub path: String,
    pub size_bytes: u64,
    pub size_human: String,
    /// `file:line` of each reference that justified the classification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Used or unused assets with their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetListing {
    #[serde(flatten)]
    pub summary: SizeSummary,
    pub items: Vec<ListedAsset>,
}

impl AssetListing {
    fn new(assets: &[Asset], result: &ClassificationResult) -> Self {
        let mut items: Vec<ListedAsset> = assets
            .iter()
            .map(|asset| ListedAsset {
                path: asset.path.clone(),
                size_bytes: asset.size_bytes,
                size_human: format_size(asset.size_bytes),
                references: result
                    .references_for(&asset.path)
                    .iter()
                    .map(|r| r.location())
                    .collect(),
            })
            .collect();
        // Largest first, then by path
        items.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.path.cmp(&b.path)));
        Self {
            summary: SizeSummary::new(items.len(), assets.iter().map(|a| a.size_bytes).sum()),
            items,
        }
    }
}

/// Where the deletion manifest was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub path: String,
    #[serde(flatten)]
    pub summary: SizeSummary,
}

/// Summary of a run.
///
/// Built once by [`ReportBuilder::build`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub mode: ReportMode,
    pub project: String,
    pub strict: bool,
    pub before: SizeSummary,
    pub after: SizeSummary,
    pub compressed: Vec<CompressionOutcome>,
    pub deleted: Vec<DeletedFile>,
    pub errors: Vec<Issue>,
    pub total_saved_pct: f64,
    pub total_saved_bytes: u64,
    pub final_weight_human: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_compressions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<AssetListing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unused: Option<AssetListing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestSummary>,
}

impl Report {
    /// Compression outcomes that replaced a file.
    pub fn replaced(&self) -> impl Iterator<Item = &CompressionOutcome> {
        self.compressed.iter().filter(|o| o.replaced())
    }

    /// Compression outcomes that failed.
    pub fn failed(&self) -> impl Iterator<Item = &CompressionOutcome> {
        self.compressed.iter().filter(|o| !o.succeeded)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Collects stage results and computes the totals.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    mode: ReportMode,
    project: String,
    strict: bool,
    before_files: usize,
    before_bytes: u64,
    compressed: Vec<CompressionOutcome>,
    deleted: Vec<DeletedFile>,
    errors: Vec<Issue>,
    api_compressions: Option<u64>,
    used: Option<AssetListing>,
    unused: Option<AssetListing>,
    manifest: Option<ManifestSummary>,
}

impl ReportBuilder {
    pub fn new(mode: ReportMode, project: impl Into<String>) -> Self {
        Self {
            mode,
            project: project.into(),
            strict: false,
            before_files: 0,
            before_bytes: 0,
            compressed: Vec::new(),
            deleted: Vec::new(),
            errors: Vec::new(),
            api_compressions: None,
            used: None,
            unused: None,
            manifest: None,
        }
    }

    /// Starting point: the assets as scanned.
    pub fn inventory(self, assets: &[Asset]) -> Self {
        let bytes = assets.iter().map(|a| a.size_bytes).sum();
        self.totals(assets.len(), bytes)
    }

    /// Starting point given as raw totals.
    pub fn totals(mut self, files: usize, size_bytes: u64) -> Self {
        self.before_files = files;
        self.before_bytes = size_bytes;
        self
    }

    /// Include the used/unused listing.
    pub fn classification(mut self, result: &ClassificationResult) -> Self {
        self.strict = result.options.strict;
        self.used = Some(AssetListing::new(&result.used, result));
        self.unused = Some(AssetListing::new(&result.unused, result));
        self
    }

    pub fn compression(mut self, run: &CompressionRun) -> Self {
        self.compressed = run.outcomes.clone();
        self.errors.extend(run.issues.iter().cloned());
        self.api_compressions = run.api_compressions;
        self
    }

    pub fn deletion(mut self, receipt: &ConfirmationReceipt) -> Self {
        self.deleted = receipt
            .deleted
            .iter()
            .map(|d| DeletedFile {
                path: d.path.clone(),
                size_bytes: d.size_bytes,
                size_human: format_size(d.size_bytes),
                backup_path: d.backup_path.clone(),
            })
            .collect();
        self
    }

    pub fn manifest(mut self, path: &Path, manifest: &DeletionManifest) -> Self {
        self.strict = manifest.strict;
        self.manifest = Some(ManifestSummary {
            path: path.to_string_lossy().into_owned(),
            summary: SizeSummary::new(manifest.entries.len(), manifest.total_bytes),
        });
        self
    }

    pub fn issues<'a>(mut self, issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        self.errors.extend(issues.into_iter().cloned());
        self
    }

    pub fn build(self) -> Report {
        let compressed_saved: u64 = self.compressed.iter().map(|o| o.saved_bytes()).sum();
        let deleted_bytes: u64 = self.deleted.iter().map(|d| d.size_bytes).sum();

        let after_bytes = self
            .before_bytes
            .saturating_sub(compressed_saved)
            .saturating_sub(deleted_bytes);
        let after_files = self.before_files.saturating_sub(self.deleted.len());

        Report {
            mode: self.mode,
            project: self.project,
            strict: self.strict,
            before: SizeSummary::new(self.before_files, self.before_bytes),
            after: SizeSummary::new(after_files, after_bytes),
            compressed: self.compressed,
            deleted: self.deleted,
            errors: self.errors,
            total_saved_pct: saved_percentage(self.before_bytes, after_bytes),
            total_saved_bytes: self.before_bytes.saturating_sub(after_bytes),
            final_weight_human: format_size(after_bytes),
            api_compressions: self.api_compressions,
            used: self.used,
            unused: self.unused,
            manifest: self.manifest,
        }
    }
}

/// Display name of a project: the final component of its root directory.
pub fn project_name(project_root: &Path) -> String {
    let resolved = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}
