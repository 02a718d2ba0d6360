//! End-to-end runs: analysis, compression and the deletion workflow.
//!
//! Inventory and extraction run single-threaded and both finish before
//! classification starts. Only compression runs concurrently.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::analysis::{AnalysisError, ReferenceExtractor, ReferenceSet};
use crate::classify::{classify, ClassificationResult, ClassifyOptions};
use crate::compress::{CompressionError, CompressionOrchestrator, Compressor};
use crate::config::AssetScopeConfig;
use crate::deletion::{DeletionError, DeletionPlanner};
use crate::inventory::AssetInventory;
use crate::issues::{Issue, IssueKind};
use crate::report::{project_name, Report, ReportBuilder, ReportMode};

/// Errors that stop a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Deletion(#[from] DeletionError),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

/// Result type alias for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// The error as a report entry.
    pub fn to_issue(&self) -> Issue {
        match self {
            PipelineError::Deletion(err) => err.to_issue(),
            PipelineError::Compression(err) => Issue::new(
                IssueKind::CompressionFailure {
                    reason: err.kind().to_string(),
                },
                None,
                err.to_string(),
            ),
            PipelineError::Analysis(err) => Issue::new(IssueKind::RunFailure, None, err.to_string()),
        }
    }
}

/// Everything one analysis pass produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub project: String,
    pub inventory: AssetInventory,
    pub references: ReferenceSet,
    pub classification: ClassificationResult,
}

impl Analysis {
    /// Scan assets, extract references and classify.
    pub fn run(project_root: &Path, config: &AssetScopeConfig) -> PipelineResult<Self> {
        let inventory = AssetInventory::scan(project_root, config);
        let mut extractor = ReferenceExtractor::new(config)?;
        let references = extractor.extract_project(project_root);
        let classification = classify(
            inventory.assets(),
            &references.references,
            ClassifyOptions::from(config),
        );

        Ok(Self {
            project: project_name(project_root),
            inventory,
            references,
            classification,
        })
    }

    /// Non-fatal problems from scanning and extraction.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.inventory
            .issues()
            .iter()
            .chain(self.references.issues.iter())
    }

    fn report(&self, mode: ReportMode) -> ReportBuilder {
        ReportBuilder::new(mode, self.project.clone())
            .inventory(self.inventory.assets())
            .classification(&self.classification)
            .issues(self.issues())
    }
}

/// Classify only. Touches nothing on disk.
pub fn analyze(project_root: &Path, config: &AssetScopeConfig) -> PipelineResult<Report> {
    let analysis = Analysis::run(project_root, config)?;
    Ok(analysis.report(ReportMode::Analyze).build())
}

/// Classify and write the deletion manifest. Deletes nothing.
pub fn plan_deletion(project_root: &Path, config: &AssetScopeConfig) -> PipelineResult<Report> {
    let analysis = Analysis::run(project_root, config)?;
    let planner = DeletionPlanner::new(project_root, config);
    let manifest = planner.plan(&analysis.project, &analysis.classification)?;
    Ok(analysis
        .report(ReportMode::PlanDelete)
        .manifest(&config.manifest_path, &manifest)
        .build())
}

/// Compress the used set, then optionally write a deletion manifest.
///
/// The manifest is written after every compression task has finished.
pub async fn compress(
    project_root: &Path,
    config: &AssetScopeConfig,
    compressor: Arc<dyn Compressor>,
    plan_deletion: bool,
) -> PipelineResult<Report> {
    let analysis = Analysis::run(project_root, config)?;
    let orchestrator = CompressionOrchestrator::new(compressor, config);
    let run = orchestrator.run(project_root, &analysis.classification).await;

    let mut builder = analysis.report(ReportMode::Compress).compression(&run);
    if plan_deletion {
        let planner = DeletionPlanner::new(project_root, config);
        let manifest = planner.plan(&analysis.project, &analysis.classification)?;
        builder = builder.manifest(&config.manifest_path, &manifest);
    }
    Ok(builder.build())
}

/// Delete what the existing manifest lists.
pub fn confirm_deletion(project_root: &Path, config: &AssetScopeConfig) -> PipelineResult<Report> {
    // Sizes before deletion, as the files are on disk now
    let inventory = AssetInventory::scan(project_root, config);
    let planner = DeletionPlanner::new(project_root, config);
    let outcome = planner.confirm()?;

    Ok(ReportBuilder::new(ReportMode::ConfirmDelete, project_name(project_root))
        .inventory(inventory.assets())
        .deletion(&outcome.receipt)
        .issues(inventory.issues())
        .issues(&outcome.issues)
        .build())
}

/// A report for a request that could not run, carrying the error as an issue.
pub fn failure_report(project_root: &Path, mode: ReportMode, error: &PipelineError) -> Report {
    ReportBuilder::new(mode, project_name(project_root))
        .issues([&error.to_issue()])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::AssetStatus;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn game() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "assets/Button.png", &[0; 400]);
        write(root, "assets/Button-min.png", &[0; 100]);
        write(root, "assets/Club.png", &[0; 300]);
        write(root, "assets/fonts/title.woff", &[0; 50]);
        write(
            root,
            "src/main.ts",
            b"import btn from '../assets/Button-min.png';\n// import Club from 'assets/Club.png'\n",
        );
        write(root, "src/style.css", b"@font-face { src: url('../assets/fonts/title.woff'); }\n");
        dir
    }

    #[test]
    fn test_analysis_classifies_project() {
        let dir = game();
        let analysis = Analysis::run(dir.path(), &AssetScopeConfig::default()).unwrap();
        let result = &analysis.classification;

        assert_eq!(result.status_of("assets/Button.png"), AssetStatus::Unused);
        assert_eq!(result.status_of("assets/Button-min.png"), AssetStatus::Used);
        assert_eq!(result.status_of("assets/Club.png"), AssetStatus::Used);
        assert_eq!(result.status_of("assets/fonts/title.woff"), AssetStatus::Used);
        assert_eq!(analysis.references.files_scanned, 2);
    }

    #[test]
    fn test_strict_analysis() {
        let dir = game();
        let config = AssetScopeConfig {
            strict: true,
            ..Default::default()
        };
        let report = analyze(dir.path(), &config).unwrap();
        let unused: Vec<_> = report
            .unused
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(unused, vec!["assets/Button.png", "assets/Club.png"]);
        assert!(report.strict);
    }

    #[test]
    fn test_plan_then_confirm() {
        let dir = game();
        let root = dir.path();
        let config = AssetScopeConfig::default();

        let planned = plan_deletion(root, &config).unwrap();
        assert_eq!(planned.manifest.as_ref().unwrap().summary.files, 1);
        assert!(root.join("assets/Button.png").exists());

        let confirmed = confirm_deletion(root, &config).unwrap();
        assert_eq!(confirmed.deleted.len(), 1);
        assert_eq!(confirmed.before.files, 4);
        assert_eq!(confirmed.after.files, 3);
        assert_eq!(confirmed.after.size_bytes, 450);
        assert!(!root.join("assets/Button.png").exists());
    }

    #[test]
    fn test_confirm_without_plan_reports_missing_manifest() {
        let dir = game();
        let err = confirm_deletion(dir.path(), &AssetScopeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Deletion(DeletionError::MissingManifest(_))
        ));

        let report = failure_report(dir.path(), ReportMode::ConfirmDelete, &err);
        assert_eq!(report.errors[0].kind, IssueKind::MissingManifest);
        assert!(dir.path().join("assets/Button.png").exists());
    }

    #[test]
    fn test_second_confirm_still_reports() {
        let dir = game();
        let root = dir.path();
        let config = AssetScopeConfig::default();
        plan_deletion(root, &config).unwrap();
        confirm_deletion(root, &config).unwrap();

        let err = confirm_deletion(root, &config).unwrap_err();
        let report = failure_report(root, ReportMode::ConfirmDelete, &err);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::ManifestAlreadyConfirmed);
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn test_corrupt_manifest_still_reports() {
        let dir = game();
        let root = dir.path();
        let config = AssetScopeConfig::default();
        plan_deletion(root, &config).unwrap();
        fs::write(root.join(&config.manifest_path), b"{ not json").unwrap();

        let err = confirm_deletion(root, &config).unwrap_err();
        let report = failure_report(root, ReportMode::ConfirmDelete, &err);
        assert_eq!(report.errors[0].kind, IssueKind::InvalidManifest);
        assert!(root.join("assets/Button.png").exists());
    }
}
