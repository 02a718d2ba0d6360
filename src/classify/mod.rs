//! Usage classification: partition the inventory into used and unused assets.
//!
//! Classification is a pure function of the assets, the references and the
//! options. Inputs are sorted before matching, so the result does not depend on
//! scan order.

pub mod matching;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::Reference;
use crate::config::{AssetScopeConfig, MatchPolicy};
use crate::inventory::{Asset, AssetStatus};

pub use matching::{contains_file_name, reference_matches};

/// Options threaded through classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyOptions {
    /// Ignore references inside comments.
    pub strict: bool,
    pub match_policy: MatchPolicy,
}

impl From<&AssetScopeConfig> for ClassifyOptions {
    fn from(config: &AssetScopeConfig) -> Self {
        Self {
            strict: config.strict,
            match_policy: config.match_policy,
        }
    }
}

/// The used/unused partition with the references behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub options: ClassifyOptions,
    /// Assets with at least one counting reference, sorted by path
    pub used: Vec<Asset>,
    /// Assets with no counting reference, sorted by path
    pub unused: Vec<Asset>,
    /// Counting references per asset path. Empty for unused assets.
    pub justification: BTreeMap<String, Vec<Reference>>,
    /// Unused assets whose only matches were commented out (strict mode).
    pub commented_only: BTreeMap<String, Vec<Reference>>,
}

impl ClassificationResult {
    pub fn status_of(&self, path: &str) -> AssetStatus {
        let found = |assets: &[Asset]| {
            assets
                .binary_search_by(|a| a.path.as_str().cmp(path))
                .is_ok()
        };
        if found(&self.used) {
            AssetStatus::Used
        } else if found(&self.unused) {
            AssetStatus::Unused
        } else {
            AssetStatus::Unknown
        }
    }

    pub fn is_used(&self, path: &str) -> bool {
        self.status_of(path) == AssetStatus::Used
    }

    /// References that justified `path` being used.
    pub fn references_for(&self, path: &str) -> &[Reference] {
        self.justification
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn used_bytes(&self) -> u64 {
        self.used.iter().map(|a| a.size_bytes).sum()
    }

    pub fn unused_bytes(&self) -> u64 {
        self.unused.iter().map(|a| a.size_bytes).sum()
    }

    pub fn total_assets(&self) -> usize {
        self.used.len() + self.unused.len()
    }
}

/// Classify `assets` against `references`.
pub fn classify(
    assets: &[Asset],
    references: &[Reference],
    options: ClassifyOptions,
) -> ClassificationResult {
    let mut assets: Vec<&Asset> = assets.iter().collect();
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    assets.dedup_by(|a, b| a.path == b.path);

    let mut references: Vec<&Reference> = references.iter().collect();
    references.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut result = ClassificationResult {
        options,
        ..Default::default()
    };

    for asset in assets {
        let matched: Vec<&Reference> = references
            .iter()
            .copied()
            .filter(|r| reference_matches(r, asset, options.match_policy))
            .collect();

        let (counting, commented): (Vec<&Reference>, Vec<&Reference>) = matched
            .into_iter()
            .partition(|r| !(options.strict && r.is_commented));

        if counting.is_empty() {
            if !commented.is_empty() {
                result
                    .commented_only
                    .insert(asset.path.clone(), commented.into_iter().cloned().collect());
            }
            result.unused.push(asset.with_status(AssetStatus::Unused));
        } else {
            result
                .justification
                .insert(asset.path.clone(), counting.into_iter().cloned().collect());
            result.used.push(asset.with_status(AssetStatus::Used));
        }
    }

    tracing::info!(
        "Classified {} assets: {} used, {} unused{}",
        result.total_assets(),
        result.used.len(),
        result.unused.len(),
        if options.strict { " (strict)" } else { "" }
    );
    result
}
