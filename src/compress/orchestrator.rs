//! Bounded, failure-isolated compression of the used set.
//!
//! Each used asset is one task. A semaphore caps the requests in flight, and a
//! task only ever writes its own file, after its own request has completed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{CompressionError, CompressionResult, Compressor};
use crate::classify::ClassificationResult;
use crate::config::AssetScopeConfig;
use crate::inventory::Asset;
use crate::issues::{Issue, IssueKind};

/// Sub-directory of the backup dir that receives pre-compression originals.
pub const COMPRESSED_BACKUP_DIR: &str = "compressed";

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// What happened to one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub path: String,
    pub before_bytes: u64,
    pub after_bytes: u64,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl CompressionOutcome {
    fn failed(asset: &Asset, err: &CompressionError) -> Self {
        Self {
            path: asset.path.clone(),
            before_bytes: asset.size_bytes,
            after_bytes: asset.size_bytes,
            succeeded: false,
            error_kind: Some(err.kind().to_string()),
        }
    }

    pub fn saved_bytes(&self) -> u64 {
        self.before_bytes.saturating_sub(self.after_bytes)
    }

    /// The file on disk was replaced with a smaller version.
    pub fn replaced(&self) -> bool {
        self.succeeded && self.after_bytes < self.before_bytes
    }
}

/// Outcomes of one compression batch.
#[derive(Debug, Clone, Default)]
pub struct CompressionRun {
    /// One outcome per used asset, sorted by path
    pub outcomes: Vec<CompressionOutcome>,
    pub issues: Vec<Issue>,
    /// Compressions used this month, as reported by the service.
    pub api_compressions: Option<u64>,
}

impl CompressionRun {
    pub fn saved_bytes(&self) -> u64 {
        self.outcomes.iter().map(|o| o.saved_bytes()).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }

    /// Record post-compression sizes on the matching assets.
    pub fn apply_sizes(&self, assets: &mut [Asset]) {
        for asset in assets.iter_mut() {
            if let Ok(idx) = self
                .outcomes
                .binary_search_by(|o| o.path.as_str().cmp(asset.path.as_str()))
            {
                asset.record_size(self.outcomes[idx].after_bytes);
            }
        }
    }
}

struct Task {
    compressor: Arc<dyn Compressor>,
    project_root: PathBuf,
    backup_dir: Option<PathBuf>,
    max_retries: u32,
    backoff: Duration,
}

/// Runs a [`Compressor`] over the used assets of a classification.
pub struct CompressionOrchestrator {
    compressor: Arc<dyn Compressor>,
    concurrency: usize,
    max_retries: u32,
    backoff: Duration,
    backup_dir: Option<PathBuf>,
}

impl CompressionOrchestrator {
    pub fn new(compressor: Arc<dyn Compressor>, config: &AssetScopeConfig) -> Self {
        Self {
            compressor,
            concurrency: config.compression.concurrency.max(1),
            max_retries: config.compression.max_retries,
            backoff: DEFAULT_BACKOFF,
            backup_dir: config.backup.then(|| config.backup_dir.clone()),
        }
    }

    /// Override the base retry delay. Attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Compress every used asset. Unused assets are never read or sent.
    pub async fn run(&self, project_root: &Path, result: &ClassificationResult) -> CompressionRun {
        let task = Arc::new(Task {
            compressor: Arc::clone(&self.compressor),
            project_root: project_root.to_path_buf(),
            backup_dir: self.backup_dir.clone(),
            max_retries: self.max_retries,
            backoff: self.backoff,
        });

        tracing::info!(
            "Compressing {} used assets ({} at a time)",
            result.used.len(),
            self.concurrency
        );

        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        for asset in result.used.iter().cloned() {
            let task = Arc::clone(&task);
            let permit = Arc::clone(&semaphore);
            let owned = asset.clone();

            let handle = join_set.spawn(async move {
                let Ok(_permit) = permit.acquire().await else {
                    let err = CompressionError::Io("worker pool closed".to_string());
                    return (CompressionOutcome::failed(&owned, &err), Some(err));
                };
                task.compress_asset(&owned).await
            });
            pending.insert(handle.id(), asset);
        }

        let mut run = CompressionRun::default();
        while let Some(res) = join_set.join_next().await {
            let (outcome, err) = match res {
                Ok(done) => done,
                Err(join_err) => {
                    // Siblings keep running; the asset keeps its original bytes
                    let Some(asset) = pending.remove(&join_err.id()) else {
                        continue;
                    };
                    let err = CompressionError::Panicked(join_err.to_string());
                    (CompressionOutcome::failed(&asset, &err), Some(err))
                }
            };
            if let Some(err) = err {
                run.issues.push(Issue::at(
                    IssueKind::CompressionFailure {
                        reason: err.kind().to_string(),
                    },
                    outcome.path.clone(),
                    err.to_string(),
                ));
            }
            run.outcomes.push(outcome);
        }

        run.outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        run.issues.sort_by(|a, b| a.path.cmp(&b.path));
        run.api_compressions = self.compressor.compression_count();

        tracing::info!(
            "Compression finished: {} replaced, {} failed, {} bytes saved",
            run.outcomes.iter().filter(|o| o.replaced()).count(),
            run.failures(),
            run.saved_bytes()
        );
        run
    }
}

impl Task {
    async fn compress_asset(
        &self,
        asset: &Asset,
    ) -> (CompressionOutcome, Option<CompressionError>) {
        match self.try_compress(asset).await {
            Ok(outcome) => (outcome, None),
            Err(err) => (CompressionOutcome::failed(asset, &err), Some(err)),
        }
    }

    async fn try_compress(&self, asset: &Asset) -> CompressionResult<CompressionOutcome> {
        let abs = asset.absolute_path(&self.project_root);
        let original = tokio::fs::read(&abs).await?;
        let before = original.len() as u64;

        let compressed = self.compress_with_retry(original, asset).await?;
        let after = compressed.len() as u64;

        if after >= before {
            tracing::debug!("{} already optimal ({} bytes)", asset.path, before);
            return Ok(CompressionOutcome {
                path: asset.path.clone(),
                before_bytes: before,
                after_bytes: before,
                succeeded: true,
                error_kind: None,
            });
        }

        if let Some(backup_dir) = &self.backup_dir {
            let dest = self
                .project_root
                .join(backup_dir)
                .join(COMPRESSED_BACKUP_DIR)
                .join(&asset.path);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&abs, &dest).await?;
        }

        // Write beside the original, then swap it in
        let mut tmp_name = abs.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".assetscope-tmp");
        let tmp = abs.with_file_name(tmp_name);
        tokio::fs::write(&tmp, &compressed).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &abs).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        tracing::debug!("{}: {} -> {} bytes", asset.path, before, after);
        Ok(CompressionOutcome {
            path: asset.path.clone(),
            before_bytes: before,
            after_bytes: after,
            succeeded: true,
            error_kind: None,
        })
    }

    async fn compress_with_retry(
        &self,
        data: Vec<u8>,
        asset: &Asset,
    ) -> CompressionResult<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.compressor.compress(data.clone(), asset.file_name()).await {
                Ok(out) => return Ok(out),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!("{}: {} (retry {})", asset.path, err, attempt);
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
