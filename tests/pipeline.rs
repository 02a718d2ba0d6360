//! End-to-end runs over a small game-ad project on disk.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use assetscope::compress::{compressor_from_config, CompressionResult, Compressor};
use assetscope::config::{AssetScopeConfig, CliOverrides, CompressionConfig};
use assetscope::deletion::{receipt_path, DeletionError, DeletionManifest};
use assetscope::export::{export_to_string, ExportFormat};
use assetscope::inventory::AssetStatus;
use assetscope::issues::IssueKind;
use assetscope::pipeline::{self, Analysis, PipelineError};
use assetscope::report::ReportMode;

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Four assets, 850 bytes in total. `Button.png` is unreferenced and
/// `Club.png` is only named inside a comment.
fn game() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "assets/Button.png", &[1; 400]);
    write(root, "assets/Button-min.png", &[2; 100]);
    write(root, "assets/Club.png", &[3; 300]);
    write(root, "assets/fonts/title.woff", &[4; 50]);
    write(
        root,
        "src/main.ts",
        b"import btn from '../assets/Button-min.png';\n// import Club from 'assets/Club.png'\n",
    );
    write(
        root,
        "src/style.css",
        b"@font-face { src: url('../assets/fonts/title.woff'); }\n",
    );
    write(
        root,
        "index.html",
        b"<html><body><canvas id=\"ad\"></canvas></body></html>\n",
    );
    dir
}

/// Returns the first half of every input and counts calls.
#[derive(Default)]
struct HalvingCompressor {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Compressor for HalvingCompressor {
    async fn compress(&self, data: Vec<u8>, file_name: &str) -> CompressionResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(file_name.to_string());
        Ok(data[..data.len() / 2].to_vec())
    }

    fn compression_count(&self) -> Option<u64> {
        Some(7)
    }
}

#[test]
fn analyze_leaves_disk_untouched() {
    let dir = game();
    let root = dir.path();
    let report = pipeline::analyze(root, &AssetScopeConfig::default()).unwrap();

    assert_eq!(report.mode, ReportMode::Analyze);
    assert_eq!(report.before.files, 4);
    assert_eq!(report.before.size_bytes, 850);
    assert_eq!(report.after, report.before);
    assert_eq!(report.total_saved_pct, 0.0);

    let unused: Vec<_> = report.unused.unwrap().items.into_iter().map(|i| i.path).collect();
    assert_eq!(unused, vec!["assets/Button.png"]);
    assert!(root.join("assets/Button.png").exists());
    assert!(!root.join(".assetscope-manifest.json").exists());
}

#[test]
fn config_file_enables_strict_mode() {
    let dir = game();
    let root = dir.path();
    fs::write(root.join("assetscope.toml"), "strict = true\n").unwrap();

    let config = AssetScopeConfig::load(root, None, &CliOverrides::default()).unwrap();
    assert!(config.strict);

    let analysis = Analysis::run(root, &config).unwrap();
    assert_eq!(
        analysis.classification.status_of("assets/Club.png"),
        AssetStatus::Unused
    );
    assert_eq!(
        analysis.classification.status_of("assets/Button-min.png"),
        AssetStatus::Used
    );
}

#[test]
fn plan_then_confirm_deletes_only_manifest_entries() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig {
        strict: true,
        backup: true,
        ..Default::default()
    };

    let planned = pipeline::plan_deletion(root, &config).unwrap();
    assert_eq!(planned.manifest.as_ref().unwrap().summary.files, 2);
    assert!(planned.deleted.is_empty());
    assert!(root.join("assets/Button.png").exists());
    assert!(root.join("assets/Club.png").exists());

    // Appears after planning, so it is not in the manifest
    write(root, "assets/Late.png", &[5; 10]);

    let confirmed = pipeline::confirm_deletion(root, &config).unwrap();
    let deleted: Vec<_> = confirmed.deleted.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(deleted, vec!["assets/Button.png", "assets/Club.png"]);
    assert!(confirmed.errors.is_empty());

    assert!(!root.join("assets/Button.png").exists());
    assert!(!root.join("assets/Club.png").exists());
    assert!(root.join("assets/Late.png").exists());
    assert!(root.join("assets/Button-min.png").exists());

    // Backups keep the original bytes
    let backup = root.join(".assetscope-backup/deleted/assets/Club.png");
    assert_eq!(fs::read(backup).unwrap(), vec![3; 300]);
}

#[test]
fn manifest_is_not_regenerated_at_confirm_time() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig::default();

    pipeline::plan_deletion(root, &config).unwrap();

    // A new reference after planning does not rescue the planned asset
    write(root, "src/late.ts", b"const b = '../assets/Button.png';\n");

    let confirmed = pipeline::confirm_deletion(root, &config).unwrap();
    assert_eq!(confirmed.deleted.len(), 1);
    assert!(!root.join("assets/Button.png").exists());
}

#[test]
fn hand_edited_manifest_is_authoritative() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig {
        strict: true,
        ..Default::default()
    };

    pipeline::plan_deletion(root, &config).unwrap();

    let manifest_path = root.join(&config.manifest_path);
    let mut manifest = DeletionManifest::read(&manifest_path).unwrap();
    manifest.entries.retain(|e| e.path != "assets/Club.png");
    manifest.write(&manifest_path).unwrap();

    let confirmed = pipeline::confirm_deletion(root, &config).unwrap();
    assert_eq!(confirmed.deleted.len(), 1);
    assert!(root.join("assets/Club.png").exists());
    assert!(!root.join("assets/Button.png").exists());
}

#[test]
fn confirm_without_plan_fails_and_deletes_nothing() {
    let dir = game();
    let root = dir.path();
    let err = pipeline::confirm_deletion(root, &AssetScopeConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Deletion(DeletionError::MissingManifest(_))
    ));

    let report = pipeline::failure_report(root, ReportMode::ConfirmDelete, &err);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, IssueKind::MissingManifest);
    assert!(report.deleted.is_empty());

    for asset in ["Button.png", "Button-min.png", "Club.png", "fonts/title.woff"] {
        assert!(root.join("assets").join(asset).exists(), "{} was removed", asset);
    }
}

#[test]
fn second_confirm_is_refused() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig::default();

    pipeline::plan_deletion(root, &config).unwrap();
    pipeline::confirm_deletion(root, &config).unwrap();

    let err = pipeline::confirm_deletion(root, &config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Deletion(DeletionError::ManifestAlreadyConfirmed { .. })
    ));

    // The refusal is still reported
    let report = pipeline::failure_report(root, ReportMode::ConfirmDelete, &err);
    let json = export_to_string(ExportFormat::Json, &report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["errors"][0]["kind"], "manifest_already_confirmed");
    assert_eq!(value["deleted"].as_array().unwrap().len(), 0);
}

#[test]
fn unwritable_receipt_still_reports_deletions() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig::default();

    pipeline::plan_deletion(root, &config).unwrap();
    fs::create_dir_all(receipt_path(&root.join(&config.manifest_path))).unwrap();

    let confirmed = pipeline::confirm_deletion(root, &config).unwrap();
    let deleted: Vec<_> = confirmed.deleted.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(deleted, vec!["assets/Button.png"]);
    assert!(confirmed
        .errors
        .iter()
        .any(|e| e.kind == IssueKind::ReceiptWriteFailure));
    assert!(!root.join("assets/Button.png").exists());
}

#[test]
fn block_comments_only_count_when_lenient() {
    let dir = game();
    let root = dir.path();
    write(root, "assets/Hero.png", &[6; 20]);
    write(root, "assets/Logo.png", &[7; 20]);
    write(
        root,
        "src/legacy.css",
        b"/*\n.hero { background: url('../assets/Hero.png'); }\n*/\n.ad { color: red; }\n",
    );
    write(
        root,
        "src/boot.js",
        b"/* const logo = require('../assets/Logo.png'); */\nstart();\n",
    );

    let lenient = Analysis::run(root, &AssetScopeConfig::default()).unwrap();
    assert_eq!(lenient.classification.status_of("assets/Hero.png"), AssetStatus::Used);
    assert_eq!(lenient.classification.status_of("assets/Logo.png"), AssetStatus::Used);

    let strict = AssetScopeConfig {
        strict: true,
        ..Default::default()
    };
    let analysis = Analysis::run(root, &strict).unwrap();
    for path in ["assets/Hero.png", "assets/Logo.png"] {
        assert_eq!(analysis.classification.status_of(path), AssetStatus::Unused, "{}", path);
        assert!(analysis.classification.commented_only[path]
            .iter()
            .all(|r| r.is_commented));
    }
}

#[tokio::test]
async fn compress_only_touches_used_assets() {
    let dir = game();
    let root = dir.path();
    let compressor = Arc::new(HalvingCompressor::default());

    let report = pipeline::compress(root, &AssetScopeConfig::default(), compressor.clone(), true)
        .await
        .unwrap();

    assert_eq!(compressor.calls.load(Ordering::SeqCst), 3);
    assert!(!compressor
        .seen
        .lock()
        .unwrap()
        .iter()
        .any(|name| name == "Button.png"));

    // Unused asset untouched, used assets halved in place
    assert_eq!(fs::read(root.join("assets/Button.png")).unwrap().len(), 400);
    assert_eq!(fs::read(root.join("assets/Club.png")).unwrap().len(), 150);
    assert_eq!(fs::read(root.join("assets/Button-min.png")).unwrap().len(), 50);

    assert_eq!(report.compressed.len(), 3);
    assert_eq!(report.total_saved_bytes, 225);
    assert_eq!(report.after.size_bytes, 625);
    assert_eq!(report.api_compressions, Some(7));

    // Planned, not deleted
    assert_eq!(report.manifest.as_ref().unwrap().summary.files, 1);
    assert!(root.join(".assetscope-manifest.json").exists());
    assert!(root.join("assets/Button.png").exists());
}

#[tokio::test]
async fn compress_without_api_key_still_reports() {
    let dir = game();
    let root = dir.path();
    let config = AssetScopeConfig {
        compression: CompressionConfig {
            api_key: None,
            ..Default::default()
        },
        ..Default::default()
    };
    let compressor = compressor_from_config(&config.compression);

    let report = pipeline::compress(root, &config, compressor, false).await.unwrap();

    assert_eq!(report.compressed.len(), 3);
    assert!(report
        .compressed
        .iter()
        .all(|o| !o.succeeded && o.error_kind.as_deref() == Some("missing-api-key")));
    let key_errors = report
        .errors
        .iter()
        .filter(|e| {
            e.kind
                == IssueKind::CompressionFailure {
                    reason: "missing-api-key".to_string(),
                }
        })
        .count();
    assert_eq!(key_errors, 3);
    assert_eq!(report.after, report.before);
    assert_eq!(fs::read(root.join("assets/Club.png")).unwrap().len(), 300);
}

#[test]
fn json_report_shape() {
    let dir = game();
    let report = pipeline::analyze(dir.path(), &AssetScopeConfig::default()).unwrap();
    let json = export_to_string(ExportFormat::Json, &report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    for key in [
        "before",
        "after",
        "compressed",
        "deleted",
        "errors",
        "total_saved_pct",
        "final_weight_human",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(value["before"]["files"], 4);
    assert_eq!(value["before"]["size_bytes"], 850);
}
