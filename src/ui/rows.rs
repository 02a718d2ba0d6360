//! Table rows for the review screen
//!
//! One row per asset. Each row carries the references that decided its
//! status, so the justification panel never has to look anything up.

use crate::analysis::Reference;
use crate::classify::ClassificationResult;
use crate::inventory::{Asset, AssetStatus};
use crate::report::format_size;

/// Which statuses the table shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Used,
    Unused,
}

impl StatusFilter {
    /// Tab order
    pub const TABS: [StatusFilter; 3] = [StatusFilter::All, StatusFilter::Used, StatusFilter::Unused];

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Used => "Used",
            StatusFilter::Unused => "Unused",
        }
    }

    /// Position in [`StatusFilter::TABS`]
    pub fn index(self) -> usize {
        match self {
            StatusFilter::All => 0,
            StatusFilter::Used => 1,
            StatusFilter::Unused => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::TABS[(self.index() + 1) % Self::TABS.len()]
    }

    pub fn admits(self, status: AssetStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Used => status == AssetStatus::Used,
            StatusFilter::Unused => status == AssetStatus::Unused,
        }
    }
}

/// One asset in the review table
#[derive(Debug, Clone)]
pub struct AssetRow {
    pub path: String,
    pub size_bytes: u64,
    pub status: AssetStatus,
    /// Counting references of a used asset, or the commented-out ones an
    /// unused asset was left with under strict mode
    pub references: Vec<Reference>,
}

impl AssetRow {
    fn new(asset: &Asset, status: AssetStatus, references: &[Reference]) -> Self {
        Self {
            path: asset.path.clone(),
            size_bytes: asset.size_bytes,
            status,
            references: references.to_vec(),
        }
    }

    pub fn size_human(&self) -> String {
        format_size(self.size_bytes)
    }

    /// Short reason shown in the table
    pub fn verdict(&self) -> String {
        match (self.status, self.references.len()) {
            (AssetStatus::Used, 1) => "1 reference".to_string(),
            (AssetStatus::Used, n) => format!("{} references", n),
            (_, 0) => "no references".to_string(),
            (_, n) => format!("{} commented out", n),
        }
    }

    /// Case-insensitive substring match on the asset path or any referencing file.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.path.to_lowercase().contains(needle)
            || self
                .references
                .iter()
                .any(|r| r.source_file.to_lowercase().contains(needle))
    }
}

/// Used assets first, then unused; largest first within each.
pub fn rows_for(result: &ClassificationResult) -> Vec<AssetRow> {
    let mut used: Vec<AssetRow> = result
        .used
        .iter()
        .map(|asset| AssetRow::new(asset, AssetStatus::Used, result.references_for(&asset.path)))
        .collect();
    let mut unused: Vec<AssetRow> = result
        .unused
        .iter()
        .map(|asset| {
            let commented = result
                .commented_only
                .get(&asset.path)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            AssetRow::new(asset, AssetStatus::Unused, commented)
        })
        .collect();

    for group in [&mut used, &mut unused] {
        group.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.path.cmp(&b.path)));
    }
    used.extend(unused);
    used
}
