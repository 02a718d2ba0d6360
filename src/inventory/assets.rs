//! Asset discovery with walkdir.
//!
//! Walks the configured asset directories and records every file whose
//! extension is in the asset set, keyed by its normalized project-relative path.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::AssetScopeConfig;
use crate::issues::{Issue, IssueKind};

/// Classification state of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Unknown,
    Used,
    Unused,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetStatus::Unknown => "unknown",
            AssetStatus::Used => "used",
            AssetStatus::Unused => "unused",
        };
        write!(f, "{}", s)
    }
}

/// An image or font file found under an asset root.
///
/// Identity is the normalized project-relative `path`. Only `status` and
/// `size_bytes` change after the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Project-relative path with `/` separators (e.g. `assets/ui/Button.png`).
    pub path: String,
    /// Size on disk in bytes.
    pub size_bytes: u64,
    /// Project-relative asset root the file was found under (`.` for the project root).
    pub root: String,
    pub status: AssetStatus,
}

impl Asset {
    /// Creates a new asset with `Unknown` status.
    pub fn new(path: impl AsRef<str>, size_bytes: u64, root: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            size_bytes,
            root: root.into(),
            status: AssetStatus::Unknown,
        }
    }

    /// The final path component, e.g. `Button.png`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        name.rfind('.')
            .filter(|&idx| idx + 1 < name.len())
            .map(|idx| name[idx + 1..].to_ascii_lowercase())
    }

    /// Location of the asset on disk.
    pub fn absolute_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.path)
    }

    /// Returns a copy with the given status.
    pub fn with_status(&self, status: AssetStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Record a new size after the file was rewritten.
    pub fn record_size(&mut self, size_bytes: u64) {
        self.size_bytes = size_bytes;
    }
}

/// Normalize a path string: `\` becomes `/`, `.` segments and duplicate
/// separators are dropped, `..` pops a preceding segment when there is one.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Express `path` relative to `root` as a normalized string.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let joined = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    Some(normalize_path(&joined))
}

/// Check if a directory should be skipped during traversal.
pub(crate) fn is_skipped_dir(entry: &walkdir::DirEntry, skip_dirs: &BTreeSet<String>) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || skip_dirs.contains(name.as_ref())
}

/// The complete, deduplicated set of assets in a project.
#[derive(Debug, Clone, Default)]
pub struct AssetInventory {
    assets: Vec<Asset>,
    roots: Vec<String>,
    issues: Vec<Issue>,
}

impl AssetInventory {
    /// Build an inventory from already-known assets (deduplicated, sorted by path).
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut inventory = Self::default();
        let mut by_path: BTreeMap<String, Asset> = BTreeMap::new();
        for asset in assets {
            inventory.insert(&mut by_path, asset);
        }
        inventory.assets = by_path.into_values().collect();
        inventory
    }

    /// Scan the project's asset directories.
    ///
    /// Falls back to the whole project when none of the configured asset
    /// directories exist. Unreadable entries become issues; the scan goes on.
    pub fn scan(project_root: &Path, config: &AssetScopeConfig) -> Self {
        let extensions = config.asset_extension_set();
        let skip_dirs: BTreeSet<String> = config.skip_dirs.iter().cloned().collect();
        let backup_dir = project_root.join(&config.backup_dir);

        let mut roots: Vec<String> = config
            .asset_dirs
            .iter()
            .filter(|dir| project_root.join(dir).is_dir())
            .map(|dir| normalize_path(dir))
            .collect();
        if roots.is_empty() {
            tracing::info!(
                "No asset directory found ({}), scanning the whole project",
                config.asset_dirs.join(", ")
            );
            roots.push(".".to_string());
        }

        let mut inventory = Self {
            roots: roots.clone(),
            ..Self::default()
        };
        let mut by_path: BTreeMap<String, Asset> = BTreeMap::new();

        for root in &roots {
            let abs_root = if root == "." {
                project_root.to_path_buf()
            } else {
                project_root.join(root)
            };
            tracing::debug!("Scanning asset root {}", abs_root.display());

            for entry in WalkDir::new(&abs_root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !is_skipped_dir(e, &skip_dirs) && e.path() != backup_dir)
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let path = err
                            .path()
                            .and_then(|p| relative_path(project_root, p))
                            .unwrap_or_else(|| root.clone());
                        inventory.issues.push(Issue::at(
                            IssueKind::UnreadableDirectory,
                            path,
                            err.to_string(),
                        ));
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                let ext = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
                    .unwrap_or_default();
                if !extensions.contains(&ext) {
                    continue;
                }

                let Some(rel) = relative_path(project_root, entry.path()) else {
                    continue;
                };

                match entry.metadata() {
                    Ok(meta) => {
                        inventory.insert(&mut by_path, Asset::new(&rel, meta.len(), root.clone()));
                    }
                    Err(err) => inventory.issues.push(Issue::at(
                        IssueKind::UnreadableDirectory,
                        rel,
                        err.to_string(),
                    )),
                }
            }
        }

        inventory.assets = by_path.into_values().collect();
        tracing::info!(
            "Found {} assets ({} bytes)",
            inventory.assets.len(),
            inventory.total_bytes()
        );
        inventory
    }

    fn insert(&mut self, by_path: &mut BTreeMap<String, Asset>, asset: Asset) {
        if let Some(existing) = by_path.get(&asset.path) {
            self.issues.push(Issue::at(
                IssueKind::DuplicateAsset,
                asset.path.clone(),
                format!(
                    "found again under `{}`, keeping the entry from `{}`",
                    asset.root, existing.root
                ),
            ));
            return;
        }
        by_path.insert(asset.path.clone(), asset);
    }

    /// All assets, ordered by path.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Asset roots that were scanned.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Problems found while scanning.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Look up an asset by normalized path.
    pub fn get(&self, path: &str) -> Option<&Asset> {
        let key = normalize_path(path);
        self.assets
            .binary_search_by(|a| a.path.as_str().cmp(key.as_str()))
            .ok()
            .map(|idx| &self.assets[idx])
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Sum of all asset sizes.
    pub fn total_bytes(&self) -> u64 {
        self.assets.iter().map(|a| a.size_bytes).sum()
    }
}
