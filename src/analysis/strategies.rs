//! Independent extraction strategies.
//!
//! Each strategy is a pure function from file text to the spans of path-like
//! strings it recognizes. The extractor runs them in priority order and keeps
//! the first match for any given span.

use std::collections::BTreeSet;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::syntax::{AnalysisResult, SourceKind};

/// Which syntactic shape produced a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// `import x from '<path>'`, `import('<path>')`, `require('<path>')`
    ModuleImport,
    /// `url(<path>)`
    StylesheetUrl,
    /// Any quoted string that ends in an asset extension
    QuotedLiteral,
}

impl ReferenceKind {
    /// Returns a short label for the reference kind.
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::ModuleImport => "import",
            ReferenceKind::StylesheetUrl => "url",
            ReferenceKind::QuotedLiteral => "literal",
        }
    }
}

/// A path-like string found in a file, by byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub kind: ReferenceKind,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A pure, independently testable way of finding references in text.
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> ReferenceKind;

    /// Whether this strategy runs on files of the given kind.
    fn applies_to(&self, source: SourceKind) -> bool;

    /// All matches in `source`, in order of appearance.
    fn find(&self, source: &str) -> Vec<RawMatch>;
}

/// Drop a `?query` or `#fragment` suffix, as bundlers allow on asset imports.
pub fn strip_query(path: &str) -> &str {
    path.find(['?', '#']).map_or(path, |idx| &path[..idx])
}

/// Returns true if the path ends in one of the (lowercase) extensions.
pub fn has_asset_extension(path: &str, extensions: &BTreeSet<String>) -> bool {
    let path = strip_query(path);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.rfind('.')
        .map(|idx| name[idx + 1..].to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn first_group(caps: &Captures<'_>, kind: ReferenceKind) -> Option<RawMatch> {
    caps.iter().skip(1).flatten().next().map(|m| RawMatch {
        kind,
        start: m.start(),
        end: m.end(),
        text: m.as_str().to_string(),
    })
}

/// Module-import style statements binding a path string.
pub struct ModuleImportStrategy {
    statement: Regex,
    call: Regex,
    extensions: BTreeSet<String>,
}

impl ModuleImportStrategy {
    pub fn new(extensions: BTreeSet<String>) -> AnalysisResult<Self> {
        Ok(Self {
            statement: Regex::new(
                r#"\b(?:import|export)\s+(?:type\s+)?(?:[\w$*{},\s]+?\s+from\s+)?['"]([^'"\r\n]+)['"]"#,
            )?,
            call: Regex::new(r#"\b(?:require|import)\s*\(\s*['"`]([^'"`\r\n]+)['"`]\s*\)"#)?,
            extensions,
        })
    }
}

impl ExtractionStrategy for ModuleImportStrategy {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::ModuleImport
    }

    fn applies_to(&self, source: SourceKind) -> bool {
        matches!(source, SourceKind::Script(_) | SourceKind::Markup)
    }

    fn find(&self, source: &str) -> Vec<RawMatch> {
        let mut matches: Vec<RawMatch> = self
            .statement
            .captures_iter(source)
            .chain(self.call.captures_iter(source))
            .filter_map(|caps| first_group(&caps, self.kind()))
            .filter(|m| has_asset_extension(&m.text, &self.extensions))
            .collect();
        matches.sort_by_key(|m| m.start);
        matches
    }
}

/// Stylesheet `url(...)` references, quoted or bare.
pub struct StylesheetUrlStrategy {
    url: Regex,
    extensions: BTreeSet<String>,
}

impl StylesheetUrlStrategy {
    pub fn new(extensions: BTreeSet<String>) -> AnalysisResult<Self> {
        Ok(Self {
            url: Regex::new(
                r#"\burl\(\s*(?:'([^'\r\n]*)'|"([^"\r\n]*)"|([^'"()\s]+))\s*\)"#,
            )?,
            extensions,
        })
    }
}

impl ExtractionStrategy for StylesheetUrlStrategy {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::StylesheetUrl
    }

    fn applies_to(&self, _source: SourceKind) -> bool {
        true
    }

    fn find(&self, source: &str) -> Vec<RawMatch> {
        self.url
            .captures_iter(source)
            .filter_map(|caps| first_group(&caps, self.kind()))
            .filter(|m| !m.text.starts_with("data:"))
            .filter(|m| has_asset_extension(&m.text, &self.extensions))
            .collect()
    }
}

/// Fallback for dynamic references: any quoted literal naming an asset file.
pub struct QuotedLiteralStrategy {
    literal: Regex,
}

impl QuotedLiteralStrategy {
    pub fn new(extensions: &BTreeSet<String>) -> AnalysisResult<Self> {
        let alternation = extensions
            .iter()
            .map(|e| regex::escape(e))
            .collect::<Vec<_>>()
            .join("|");
        let ext = format!(r"\.(?i:{})", alternation);
        let pattern = format!(
            r#"'([^'\r\n]*?{ext}(?:[?#][^'\r\n]*)?)'|"([^"\r\n]*?{ext}(?:[?#][^"\r\n]*)?)"|`([^`]*?{ext}(?:[?#][^`]*)?)`"#,
            ext = ext
        );
        Ok(Self {
            literal: Regex::new(&pattern)?,
        })
    }
}

impl ExtractionStrategy for QuotedLiteralStrategy {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::QuotedLiteral
    }

    fn applies_to(&self, _source: SourceKind) -> bool {
        true
    }

    fn find(&self, source: &str) -> Vec<RawMatch> {
        self.literal
            .captures_iter(source)
            .filter_map(|caps| first_group(&caps, self.kind()))
            .collect()
    }
}

/// The standard strategies, in priority order.
pub fn default_strategies(
    extensions: &BTreeSet<String>,
) -> AnalysisResult<Vec<Box<dyn ExtractionStrategy>>> {
    Ok(vec![
        Box::new(ModuleImportStrategy::new(extensions.clone())?),
        Box::new(StylesheetUrlStrategy::new(extensions.clone())?),
        Box::new(QuotedLiteralStrategy::new(extensions)?),
    ])
}
