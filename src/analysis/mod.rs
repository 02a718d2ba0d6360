//! Source code analysis module for assetscope.
//!
//! This module scans JavaScript/TypeScript, stylesheet and markup files for
//! strings that plausibly name an asset.
//!
//! # Features
//!
//! - Parse ES6 `import` statements, dynamic `import()` and CommonJS `require()`
//! - Parse stylesheet `url(...)` references
//! - Fall back to any quoted literal ending in an asset extension
//! - Tag every reference found inside a `//`, `/* */` or `<!-- -->` comment
//! - Resolve `./` and `../` paths against the containing file
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use assetscope::analysis::ReferenceExtractor;
//! use assetscope::config::AssetScopeConfig;
//!
//! let mut extractor = ReferenceExtractor::new(&AssetScopeConfig::default())?;
//! let set = extractor.extract_project(Path::new("./game"));
//!
//! for reference in set.references.iter().filter(|r| !r.is_commented) {
//!     println!("{}", reference);
//! }
//! ```

pub mod references;
pub mod strategies;
pub mod syntax;

// Re-export main types for convenience
pub use references::{FileReferences, MatchMode, Reference, ReferenceExtractor, ReferenceSet};
pub use strategies::{
    default_strategies, ExtractionStrategy, ModuleImportStrategy, QuotedLiteralStrategy, RawMatch,
    ReferenceKind, StylesheetUrlStrategy,
};
pub use syntax::{
    scan_comments, AnalysisError, AnalysisResult, CommentStyle, SourceKind, SourceLanguage,
    SyntaxMap, SyntaxScanner,
};
