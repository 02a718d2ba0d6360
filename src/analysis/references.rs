//! Reference extraction across a project's source and style files.
//!
//! Every path-like string found by a strategy becomes a [`Reference`], tagged
//! with whether it sits inside a comment and how it should be matched against
//! assets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::strategies::{default_strategies, strip_query, ExtractionStrategy, ReferenceKind};
use super::syntax::{AnalysisError, AnalysisResult, SourceKind, SyntaxScanner};
use crate::config::AssetScopeConfig;
use crate::inventory::assets::is_skipped_dir;
use crate::inventory::{normalize_path, relative_path};
use crate::issues::{Issue, IssueKind};

/// How a reference is compared against asset paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// `target` is a project path that must equal the asset path.
    Exact,
    /// `target` must contain the asset's file name.
    Substring,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Substring => write!(f, "substring"),
        }
    }
}

/// A single occurrence of an asset-like string in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// The string as it appeared in the source, without quotes.
    pub raw_text: String,
    /// Project-relative path of the file containing the reference.
    pub source_file: String,
    /// Line number in the source file (1-indexed)
    pub line_number: usize,
    pub is_commented: bool,
    pub match_mode: MatchMode,
    /// Matchable form: the resolved project path for `Exact`, the normalized
    /// fragment for `Substring`.
    pub target: String,
    pub kind: ReferenceKind,
}

impl Reference {
    /// Total order over every field, for deterministic listings.
    pub fn sort_key(&self) -> (&str, usize, &str, ReferenceKind, bool, MatchMode, &str) {
        (
            &self.source_file,
            self.line_number,
            &self.raw_text,
            self.kind,
            self.is_commented,
            self.match_mode,
            &self.target,
        )
    }

    /// Build a reference, resolving `raw_text` against the source file's directory.
    pub fn new(
        raw_text: impl Into<String>,
        source_file: impl Into<String>,
        line_number: usize,
        is_commented: bool,
        kind: ReferenceKind,
    ) -> Self {
        let raw_text = raw_text.into();
        let source_file = normalize_path(&source_file.into());
        let (match_mode, target) = resolve(&raw_text, &source_file);
        Self {
            raw_text,
            source_file,
            line_number,
            is_commented,
            match_mode,
            target,
            kind,
        }
    }

    /// `file:line` for display.
    pub fn location(&self) -> String {
        format!("{}:{}", self.source_file, self.line_number)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}'{}",
            self.location(),
            self.kind.label(),
            self.raw_text,
            if self.is_commented { " (commented)" } else { "" }
        )
    }
}

/// Relative paths resolve to an exact project path; anything else is a fragment.
fn resolve(raw_text: &str, source_file: &str) -> (MatchMode, String) {
    let path = strip_query(raw_text.trim()).replace('\\', "/");
    if path.starts_with("./") || path.starts_with("../") {
        let dir = Path::new(source_file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let resolved = dir.join(&path).clean();
        (
            MatchMode::Exact,
            normalize_path(&resolved.to_string_lossy()),
        )
    } else {
        (MatchMode::Substring, path)
    }
}

/// References found in one file.
#[derive(Debug, Clone, Default)]
pub struct FileReferences {
    pub references: Vec<Reference>,
    /// Comments were detected lexically because the parser reported errors.
    pub degraded: bool,
}

/// All references in a project, plus the problems met while collecting them.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pub references: Vec<Reference>,
    pub issues: Vec<Issue>,
    pub files_scanned: usize,
}

impl ReferenceSet {
    /// References that are not inside comments.
    pub fn active(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| !r.is_commented)
    }

    /// References that are inside comments.
    pub fn commented(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.is_commented)
    }
}

/// Runs the extraction strategies over source files.
pub struct ReferenceExtractor {
    scanner: SyntaxScanner,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    source_extensions: BTreeSet<String>,
    skip_dirs: BTreeSet<String>,
    backup_dir: PathBuf,
}

impl ReferenceExtractor {
    /// Create an extractor with the standard strategies.
    pub fn new(config: &AssetScopeConfig) -> AnalysisResult<Self> {
        let strategies = default_strategies(&config.asset_extension_set())?;
        Self::with_strategies(config, strategies)
    }

    /// Create an extractor with a custom set of strategies, in priority order.
    pub fn with_strategies(
        config: &AssetScopeConfig,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
    ) -> AnalysisResult<Self> {
        Ok(Self {
            scanner: SyntaxScanner::new()?,
            strategies,
            source_extensions: config.source_extension_set(),
            skip_dirs: config.skip_dirs.iter().cloned().collect(),
            backup_dir: config.backup_dir.clone(),
        })
    }

    /// Extract references from source text.
    ///
    /// When two strategies match the same span, the earlier strategy wins, so
    /// each occurrence yields exactly one reference.
    pub fn extract_source(
        &mut self,
        source: &str,
        kind: SourceKind,
        source_file: &str,
    ) -> FileReferences {
        let outcome = self.scanner.scan(source, kind);
        let mut by_start = BTreeMap::new();

        for strategy in self.strategies.iter().filter(|s| s.applies_to(kind)) {
            for found in strategy.find(source) {
                by_start.entry(found.start).or_insert(found);
            }
        }

        let references = by_start
            .into_values()
            .map(|found| {
                Reference::new(
                    found.text,
                    source_file,
                    outcome.map.line_of(found.start),
                    outcome.map.is_commented(found.start),
                    found.kind,
                )
            })
            .collect();

        FileReferences {
            references,
            degraded: outcome.degraded,
        }
    }

    /// Analyze a single file. Problems that still allow extraction come back as issues.
    pub fn extract_file(
        &mut self,
        project_root: &Path,
        path: &Path,
    ) -> AnalysisResult<(Vec<Reference>, Vec<Issue>)> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let kind = SourceKind::from_extension(ext)
            .ok_or_else(|| AnalysisError::UnsupportedFileType(ext.to_string()))?;

        let rel = relative_path(project_root, path)
            .unwrap_or_else(|| normalize_path(&path.to_string_lossy()));
        let bytes = fs::read(path)?;
        let mut issues = Vec::new();

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                issues.push(Issue::at(
                    IssueKind::UnparseableSourceFile,
                    rel.clone(),
                    "file is not valid UTF-8; scanned with replacement characters",
                ));
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };

        let found = self.extract_source(&content, kind, &rel);
        if found.degraded {
            issues.push(Issue::at(
                IssueKind::UnparseableSourceFile,
                rel.clone(),
                "syntax errors; comments detected lexically",
            ));
        }
        tracing::debug!("{}: {} references", rel, found.references.len());
        Ok((found.references, issues))
    }

    /// Analyze every source file under the project root.
    pub fn extract_project(&mut self, project_root: &Path) -> ReferenceSet {
        let mut set = ReferenceSet::default();
        let backup_dir = project_root.join(&self.backup_dir);
        let skip_dirs = self.skip_dirs.clone();

        let walker = WalkDir::new(project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e, &skip_dirs) && e.path() != backup_dir);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .and_then(|p| relative_path(project_root, p))
                        .unwrap_or_default();
                    set.issues.push(Issue::at(
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

            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if !self.source_extensions.contains(&ext) {
                continue;
            }

            set.files_scanned += 1;
            match self.extract_file(project_root, path) {
                Ok((references, issues)) => {
                    set.references.extend(references);
                    set.issues.extend(issues);
                }
                Err(err) => {
                    // Log error but continue with other files
                    let rel = relative_path(project_root, path).unwrap_or_default();
                    set.issues.push(Issue::at(
                        IssueKind::UnparseableSourceFile,
                        rel,
                        err.to_string(),
                    ));
                }
            }
        }

        tracing::info!(
            "Extracted {} references from {} files ({} commented)",
            set.references.len(),
            set.files_scanned,
            set.commented().count()
        );
        set
    }
}
