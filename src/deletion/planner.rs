//! Plan and confirm: the two steps of the deletion state machine.
//!
//! ```text
//! NoManifest --plan--> ManifestWritten --confirm--> Deleted
//!                ^                                     |
//!                +---------------plan------------------+
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::manifest::{receipt_path, ConfirmationReceipt, DeletedEntry, DeletionManifest};
use super::{DeletionError, DeletionResult};
use crate::classify::ClassificationResult;
use crate::config::AssetScopeConfig;
use crate::inventory::normalize_path;
use crate::issues::{Issue, IssueKind};

/// Sub-directory of the backup dir that receives deleted originals.
pub const DELETED_BACKUP_DIR: &str = "deleted";

/// Where a project is in the deletion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionState {
    NoManifest,
    ManifestWritten,
    Deleted,
}

/// Result of a confirmation.
#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    pub manifest: DeletionManifest,
    pub receipt: ConfirmationReceipt,
    pub issues: Vec<Issue>,
    /// Directories left empty by the deletion and removed.
    pub removed_dirs: Vec<String>,
}

/// Runs the deletion workflow for one project.
pub struct DeletionPlanner<'a> {
    project_root: &'a Path,
    config: &'a AssetScopeConfig,
}

impl<'a> DeletionPlanner<'a> {
    pub fn new(project_root: &'a Path, config: &'a AssetScopeConfig) -> Self {
        Self {
            project_root,
            config,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_root.join(&self.config.manifest_path)
    }

    pub fn receipt_path(&self) -> PathBuf {
        receipt_path(&self.manifest_path())
    }

    /// Inspect the manifest and receipt on disk.
    pub fn state(&self) -> DeletionResult<DeletionState> {
        let manifest_path = self.manifest_path();
        if !manifest_path.is_file() {
            return Ok(DeletionState::NoManifest);
        }
        let manifest = DeletionManifest::read(&manifest_path)?;
        match self.read_receipt()? {
            Some(receipt) if receipt.confirms(&manifest) => Ok(DeletionState::Deleted),
            _ => Ok(DeletionState::ManifestWritten),
        }
    }

    /// Persist the unused set of `result` as the manifest. Deletes nothing.
    ///
    /// Overwrites any previous manifest and clears its receipt.
    pub fn plan(
        &self,
        project: &str,
        result: &ClassificationResult,
    ) -> DeletionResult<DeletionManifest> {
        let manifest = DeletionManifest::from_classification(project, result);
        let path = self.manifest_path();
        manifest.write(&path)?;

        match fs::remove_file(self.receipt_path()) {
            Ok(()) => tracing::debug!("Cleared receipt of the previous manifest"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            "Wrote deletion manifest {} ({} files, {} bytes)",
            path.display(),
            manifest.entries.len(),
            manifest.total_bytes
        );
        Ok(manifest)
    }

    /// Delete exactly the files listed in the manifest.
    ///
    /// The manifest is never regenerated here. Missing files, failed backups
    /// and failed removals are recorded as issues and skipped.
    pub fn confirm(&self) -> DeletionResult<DeletionOutcome> {
        let manifest_path = self.manifest_path();
        if !manifest_path.is_file() {
            return Err(DeletionError::MissingManifest(manifest_path));
        }
        let manifest = DeletionManifest::read(&manifest_path)?;
        if let Some(receipt) = self.read_receipt()? {
            if receipt.confirms(&manifest) {
                return Err(DeletionError::ManifestAlreadyConfirmed {
                    path: manifest_path,
                    confirmed_at: receipt.confirmed_at,
                });
            }
        }

        let backup = self.config.backup;
        let mut deleted = Vec::new();
        let mut skipped = Vec::new();
        let mut issues = Vec::new();

        for entry in &manifest.entries {
            let rel = normalize_path(&entry.path);
            if !is_contained(&rel) {
                issues.push(Issue::at(
                    IssueKind::StaleManifestEntry,
                    rel.clone(),
                    "path is outside the project",
                ));
                skipped.push(rel);
                continue;
            }

            let abs = self.project_root.join(&rel);
            if !abs.is_file() {
                issues.push(Issue::at(
                    IssueKind::StaleManifestEntry,
                    rel.clone(),
                    "listed in the manifest but no longer on disk",
                ));
                skipped.push(rel);
                continue;
            }

            let backup_path = if backup {
                match self.backup_file(&abs, &rel) {
                    Ok(path) => Some(path),
                    Err(err) => {
                        issues.push(Issue::at(
                            IssueKind::BackupWriteFailure,
                            rel.clone(),
                            format!("backup failed, file kept: {}", err),
                        ));
                        skipped.push(rel);
                        continue;
                    }
                }
            } else {
                None
            };

            // Record the size on disk now; compression may have run since planning
            let size_bytes = fs::metadata(&abs)
                .map(|m| m.len())
                .unwrap_or(entry.size_bytes);
            if let Err(err) = fs::remove_file(&abs) {
                issues.push(Issue::at(IssueKind::DeleteFailure, rel.clone(), err.to_string()));
                skipped.push(rel);
                continue;
            }

            tracing::debug!("Deleted {}", rel);
            deleted.push(DeletedEntry {
                path: rel,
                size_bytes,
                backup_path,
            });
        }

        let removed_dirs = self.remove_empty_dirs(&deleted);

        let receipt = ConfirmationReceipt {
            manifest_created_at: manifest.created_at,
            confirmed_at: Utc::now(),
            backup,
            deleted,
            skipped,
        };
        // Files are already gone here; a receipt failure is recorded, not returned
        let receipt_path = self.receipt_path();
        if let Err(err) = receipt.write(&receipt_path) {
            issues.push(Issue::at(
                IssueKind::ReceiptWriteFailure,
                receipt_path.to_string_lossy(),
                format!("deleted files are not recorded on disk: {}", err),
            ));
        }

        tracing::info!(
            "Deleted {} of {} files ({} bytes)",
            receipt.deleted.len(),
            manifest.entries.len(),
            receipt.deleted_bytes()
        );

        Ok(DeletionOutcome {
            manifest,
            receipt,
            issues,
            removed_dirs,
        })
    }

    fn read_receipt(&self) -> DeletionResult<Option<ConfirmationReceipt>> {
        let path = self.receipt_path();
        if !path.is_file() {
            return Ok(None);
        }
        ConfirmationReceipt::read(&path).map(Some)
    }

    /// Copy `abs` to `<backup_dir>/deleted/<rel>` and return the copy's relative path.
    fn backup_file(&self, abs: &Path, rel: &str) -> io::Result<String> {
        let dest_rel = self
            .config
            .backup_dir
            .join(DELETED_BACKUP_DIR)
            .join(rel);
        let dest = self.project_root.join(&dest_rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(abs, &dest)?;
        Ok(normalize_path(&dest_rel.to_string_lossy()))
    }

    /// Remove parent directories emptied by the deletion, stopping at asset roots.
    fn remove_empty_dirs(&self, deleted: &[DeletedEntry]) -> Vec<String> {
        let roots: Vec<String> = self
            .config
            .asset_dirs
            .iter()
            .map(|dir| normalize_path(dir))
            .collect();

        let mut pending: BTreeSet<String> = deleted
            .iter()
            .filter_map(|d| parent_of(&d.path))
            .collect();
        let mut removed = Vec::new();

        // Deepest first, so children are gone before their parent is checked
        while let Some(dir) = pending
            .iter()
            .max_by_key(|d| (d.matches('/').count(), d.as_str()))
            .cloned()
        {
            pending.remove(&dir);
            if roots.contains(&dir) {
                continue;
            }
            let abs = self.project_root.join(&dir);
            let is_empty = fs::read_dir(&abs)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty && fs::remove_dir(&abs).is_ok() {
                tracing::debug!("Removed empty directory {}", dir);
                if let Some(parent) = parent_of(&dir) {
                    pending.insert(parent);
                }
                removed.push(dir);
            }
        }
        removed.sort();
        removed
    }
}

fn parent_of(path: &str) -> Option<String> {
    path.rsplit_once('/').map(|(parent, _)| parent.to_string())
}

/// A normalized relative path that stays inside the project.
fn is_contained(rel: &str) -> bool {
    !rel.is_empty()
        && Path::new(rel)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyOptions};
    use crate::deletion::{DeletionReason, ManifestEntry};
    use crate::inventory::Asset;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"img").unwrap();
    }

    /// Classification with every given asset unused.
    fn all_unused(paths: &[&str]) -> ClassificationResult {
        let assets: Vec<Asset> = paths.iter().map(|p| Asset::new(p, 3, "assets")).collect();
        classify(&assets, &[], ClassifyOptions::default())
    }

    #[test]
    fn test_confirm_without_plan_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/a.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(dir.path(), &config);

        assert_eq!(planner.state().unwrap(), DeletionState::NoManifest);
        let err = planner.confirm().unwrap_err();
        assert!(matches!(err, DeletionError::MissingManifest(_)));
        assert!(dir.path().join("assets/a.png").exists());
    }

    #[test]
    fn test_plan_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/a.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(dir.path(), &config);

        let manifest = planner.plan("game", &all_unused(&["assets/a.png"])).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert!(planner.manifest_path().is_file());
        assert!(dir.path().join("assets/a.png").exists());
        assert_eq!(planner.state().unwrap(), DeletionState::ManifestWritten);
    }

    #[test]
    fn test_confirm_deletes_exactly_the_manifest() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/a.png");
        write(root, "assets/b.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(root, &config);

        planner.plan("game", &all_unused(&["assets/a.png"])).unwrap();
        // A reference added after planning does not change what confirm removes
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.ts"), "load('a.png');\n").unwrap();

        let outcome = planner.confirm().unwrap();
        assert_eq!(outcome.receipt.deleted.len(), 1);
        assert_eq!(outcome.receipt.deleted[0].path, "assets/a.png");
        assert!(!root.join("assets/a.png").exists());
        assert!(root.join("assets/b.png").exists());
        assert!(planner.manifest_path().is_file());
        assert_eq!(planner.state().unwrap(), DeletionState::Deleted);
    }

    #[test]
    fn test_stale_entry_is_an_issue() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/a.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(root, &config);

        planner
            .plan("game", &all_unused(&["assets/a.png", "assets/gone.png"]))
            .unwrap();
        let outcome = planner.confirm().unwrap();

        assert_eq!(outcome.receipt.deleted.len(), 1);
        assert_eq!(outcome.receipt.skipped, vec!["assets/gone.png".to_string()]);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::StaleManifestEntry);
    }

    #[test]
    fn test_escaping_entry_is_never_touched() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        write(dir.path(), "outside.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(&root, &config);

        let mut manifest = planner.plan("game", &all_unused(&[])).unwrap();
        manifest.entries.push(ManifestEntry {
            path: "../outside.png".into(),
            size_bytes: 3,
            reason: DeletionReason::Unreferenced,
        });
        manifest.write(&planner.manifest_path()).unwrap();

        let outcome = planner.confirm().unwrap();
        assert!(outcome.receipt.deleted.is_empty());
        assert!(dir.path().join("outside.png").exists());
    }

    #[test]
    fn test_backup_copies_before_delete() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/ui/a.png");
        let config = AssetScopeConfig {
            backup: true,
            ..Default::default()
        };
        let planner = DeletionPlanner::new(root, &config);

        planner.plan("game", &all_unused(&["assets/ui/a.png"])).unwrap();
        let outcome = planner.confirm().unwrap();

        let copy = ".assetscope-backup/deleted/assets/ui/a.png";
        assert_eq!(outcome.receipt.deleted[0].backup_path.as_deref(), Some(copy));
        assert_eq!(fs::read(root.join(copy)).unwrap(), b"img");
        assert!(!root.join("assets/ui/a.png").exists());
    }

    #[test]
    fn test_backup_failure_keeps_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/a.png");
        // A regular file where the backup directory should go
        fs::write(root.join("blocker"), b"").unwrap();
        let config = AssetScopeConfig {
            backup: true,
            backup_dir: PathBuf::from("blocker"),
            ..Default::default()
        };
        let planner = DeletionPlanner::new(root, &config);

        planner.plan("game", &all_unused(&["assets/a.png"])).unwrap();
        let outcome = planner.confirm().unwrap();

        assert!(outcome.receipt.deleted.is_empty());
        assert_eq!(outcome.issues[0].kind, IssueKind::BackupWriteFailure);
        assert!(root.join("assets/a.png").exists());
    }

    #[test]
    fn test_manifest_is_consumed_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/a.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(root, &config);

        planner.plan("game", &all_unused(&["assets/a.png"])).unwrap();
        planner.confirm().unwrap();
        let err = planner.confirm().unwrap_err();
        assert!(matches!(err, DeletionError::ManifestAlreadyConfirmed { .. }));

        // A fresh plan starts a new cycle
        planner.plan("game", &all_unused(&[])).unwrap();
        assert!(!planner.receipt_path().exists());
        assert_eq!(planner.state().unwrap(), DeletionState::ManifestWritten);
    }

    #[test]
    fn test_receipt_failure_keeps_outcome() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/a.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(root, &config);

        planner.plan("game", &all_unused(&["assets/a.png"])).unwrap();
        fs::create_dir_all(planner.receipt_path()).unwrap();
        let outcome = planner.confirm().unwrap();

        assert_eq!(outcome.receipt.deleted.len(), 1);
        assert_eq!(outcome.receipt.deleted[0].path, "assets/a.png");
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::ReceiptWriteFailure);
        assert!(!root.join("assets/a.png").exists());
    }

    #[test]
    fn test_empty_dirs_removed_but_not_asset_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/anim/run/f1.png");
        write(root, "assets/anim/run/f2.png");
        write(root, "assets/hero.png");
        let config = AssetScopeConfig::default();
        let planner = DeletionPlanner::new(root, &config);

        planner
            .plan(
                "game",
                &all_unused(&["assets/anim/run/f1.png", "assets/anim/run/f2.png", "assets/hero.png"]),
            )
            .unwrap();
        let outcome = planner.confirm().unwrap();

        assert_eq!(
            outcome.removed_dirs,
            vec!["assets/anim".to_string(), "assets/anim/run".to_string()]
        );
        assert!(root.join("assets").is_dir());
    }
}
