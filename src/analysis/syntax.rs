//! Comment-span detection for source and style files.
//!
//! Scripts are parsed with tree-sitter so that comment nodes are exact: a
//! `//` inside a string, template literal, regex literal or JSX text is never
//! mistaken for a comment. Stylesheets and markup, and scripts that tree-sitter
//! cannot parse cleanly, go through a small lexical scanner instead.

use std::ops::Range;

use thiserror::Error;
use tree_sitter::{Language, Parser, TreeCursor};

/// Errors that can occur during reference analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Tree-sitter language initialization failed")]
    LanguageInit,

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Language type for script files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Tsx,
    Jsx,
}

impl SourceLanguage {
    /// Get tree-sitter language for this source language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SourceLanguage::JavaScript | SourceLanguage::Jsx => {
                tree_sitter_javascript::LANGUAGE.into()
            }
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// The syntax family of a scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script(SourceLanguage),
    /// CSS has only block comments; SCSS and LESS also allow `//`.
    Stylesheet { line_comments: bool },
    Markup,
}

impl SourceKind {
    /// Determine the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(SourceKind::Script(SourceLanguage::JavaScript)),
            "jsx" => Some(SourceKind::Script(SourceLanguage::Jsx)),
            "ts" | "mts" | "cts" => Some(SourceKind::Script(SourceLanguage::TypeScript)),
            "tsx" => Some(SourceKind::Script(SourceLanguage::Tsx)),
            "css" => Some(SourceKind::Stylesheet {
                line_comments: false,
            }),
            "scss" | "sass" | "less" => Some(SourceKind::Stylesheet {
                line_comments: true,
            }),
            "html" | "htm" => Some(SourceKind::Markup),
            _ => None,
        }
    }

    /// Comment syntax used by the lexical scanner for this kind.
    pub fn comment_style(&self) -> CommentStyle {
        match self {
            SourceKind::Script(_) => CommentStyle {
                line: true,
                block: true,
                markup: false,
                strings: true,
            },
            SourceKind::Stylesheet { line_comments } => CommentStyle {
                line: *line_comments,
                block: true,
                markup: false,
                strings: true,
            },
            // Apostrophes in prose would open bogus strings, so markup skips string tracking
            SourceKind::Markup => CommentStyle {
                line: false,
                block: false,
                markup: true,
                strings: false,
            },
        }
    }
}

/// Which comment delimiters the lexical scanner recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    /// `// ...` to end of line
    pub line: bool,
    /// `/* ... */`
    pub block: bool,
    /// `<!-- ... -->`
    pub markup: bool,
    /// Track quoted strings so delimiters inside them are ignored.
    pub strings: bool,
}

/// Comment spans and line offsets of one file.
#[derive(Debug, Clone, Default)]
pub struct SyntaxMap {
    comments: Vec<Range<usize>>,
    line_starts: Vec<usize>,
}

impl SyntaxMap {
    /// Build a map from comment spans, which may arrive unsorted.
    pub fn new(source: &str, mut comments: Vec<Range<usize>>) -> Self {
        comments.sort_by_key(|r| r.start);
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            comments,
            line_starts,
        }
    }

    /// Returns true if the byte offset lies inside a comment.
    pub fn is_commented(&self, offset: usize) -> bool {
        let idx = self.comments.partition_point(|r| r.end <= offset);
        self.comments
            .get(idx)
            .is_some_and(|r| r.start <= offset && offset < r.end)
    }

    /// 1-indexed line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    pub fn comments(&self) -> &[Range<usize>] {
        &self.comments
    }
}

/// Find comment spans with a single forward pass over the bytes.
///
/// All delimiters are ASCII, so every span boundary is a valid char boundary.
pub fn scan_comments(source: &str, style: CommentStyle) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut comments = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        let b = bytes[i];

        if style.strings && matches!(b, b'\'' | b'"' | b'`') {
            i = skip_string(bytes, i);
            continue;
        }

        if style.line && rest.starts_with(b"//") {
            // `scheme://` in an unquoted url is not a comment
            if i > 0 && bytes[i - 1] == b':' {
                i += 2;
                continue;
            }
            let end = find_from(bytes, i, b"\n").unwrap_or(bytes.len());
            comments.push(i..end);
            i = end;
            continue;
        }

        if style.block && rest.starts_with(b"/*") {
            let end = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
            comments.push(i..end);
            i = end;
            continue;
        }

        if style.markup && rest.starts_with(b"<!--") {
            let end = find_from(bytes, i + 4, b"-->").map_or(bytes.len(), |p| p + 3);
            comments.push(i..end);
            i = end;
            continue;
        }

        i += 1;
    }

    comments
}

/// Skip a quoted string starting at `start`, returning the offset just past it.
/// Single and double quoted strings end at an unescaped newline.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if quote != b'`' => return i + 1,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn find_from(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Result of scanning one file.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub map: SyntaxMap,
    /// The parser reported syntax errors and comments were found lexically instead.
    pub degraded: bool,
}

/// Builds [`SyntaxMap`]s, reusing one tree-sitter parser per language.
pub struct SyntaxScanner {
    js_parser: Parser,
    ts_parser: Parser,
    tsx_parser: Parser,
}

impl SyntaxScanner {
    /// Create a new scanner.
    pub fn new() -> AnalysisResult<Self> {
        Ok(Self {
            js_parser: parser_for(SourceLanguage::JavaScript)?,
            ts_parser: parser_for(SourceLanguage::TypeScript)?,
            tsx_parser: parser_for(SourceLanguage::Tsx)?,
        })
    }

    /// Find the comment spans of a source file.
    pub fn scan(&mut self, source: &str, kind: SourceKind) -> ScanOutcome {
        let SourceKind::Script(language) = kind else {
            return ScanOutcome {
                map: SyntaxMap::new(source, scan_comments(source, kind.comment_style())),
                degraded: false,
            };
        };

        let parser = match language {
            SourceLanguage::JavaScript | SourceLanguage::Jsx => &mut self.js_parser,
            SourceLanguage::TypeScript => &mut self.ts_parser,
            SourceLanguage::Tsx => &mut self.tsx_parser,
        };

        match parser.parse(source, None) {
            Some(tree) if !tree.root_node().has_error() => {
                let mut comments = Vec::new();
                let mut cursor = tree.walk();
                collect_comments(&mut cursor, &mut comments);
                ScanOutcome {
                    map: SyntaxMap::new(source, comments),
                    degraded: false,
                }
            }
            _ => ScanOutcome {
                map: SyntaxMap::new(source, scan_comments(source, kind.comment_style())),
                degraded: true,
            },
        }
    }
}

fn parser_for(language: SourceLanguage) -> AnalysisResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|_| AnalysisError::LanguageInit)?;
    Ok(parser)
}

/// Recursively visit nodes and record comment spans.
fn collect_comments(cursor: &mut TreeCursor, comments: &mut Vec<Range<usize>>) {
    let node = cursor.node();
    if matches!(node.kind(), "comment" | "html_comment") {
        comments.push(node.start_byte()..node.end_byte());
        return;
    }

    if cursor.goto_first_child() {
        loop {
            collect_comments(cursor, comments);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_map(source: &str, language: SourceLanguage) -> ScanOutcome {
        let mut scanner = SyntaxScanner::new().unwrap();
        scanner.scan(source, SourceKind::Script(language))
    }

    fn offset_of(source: &str, needle: &str) -> usize {
        source.find(needle).unwrap()
    }

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(
            SourceKind::from_extension("TS"),
            Some(SourceKind::Script(SourceLanguage::TypeScript))
        );
        assert_eq!(
            SourceKind::from_extension("css"),
            Some(SourceKind::Stylesheet {
                line_comments: false
            })
        );
        assert_eq!(SourceKind::from_extension("html"), Some(SourceKind::Markup));
        assert_eq!(SourceKind::from_extension("png"), None);
    }

    // ===== Tree-sitter scanning =====

    #[test]
    fn test_line_comment_detected() {
        let source = "// import Club from 'assets/Club.png'\nconst a = 1;\n";
        let outcome = script_map(source, SourceLanguage::TypeScript);
        assert!(!outcome.degraded);
        assert!(outcome.map.is_commented(offset_of(source, "assets/Club")));
        assert!(!outcome.map.is_commented(offset_of(source, "const")));
    }

    #[test]
    fn test_trailing_comment_on_code_line() {
        let source = "load('a.png'); // load('b.png')\n";
        let outcome = script_map(source, SourceLanguage::JavaScript);
        assert!(!outcome.map.is_commented(offset_of(source, "a.png")));
        assert!(outcome.map.is_commented(offset_of(source, "b.png")));
    }

    #[test]
    fn test_multiline_block_comment() {
        let source = "/*\n  const bg = 'bg.png';\n*/\nconst fg = 'fg.png';\n";
        let outcome = script_map(source, SourceLanguage::JavaScript);
        assert!(outcome.map.is_commented(offset_of(source, "bg.png")));
        assert!(!outcome.map.is_commented(offset_of(source, "fg.png")));
    }

    #[test]
    fn test_url_in_string_is_not_comment() {
        let source = "const cdn = 'https://cdn.example.com/Button.png';\nconst x = 'x.png';\n";
        let outcome = script_map(source, SourceLanguage::JavaScript);
        assert!(outcome.map.comments().is_empty());
        assert!(!outcome.map.is_commented(offset_of(source, "x.png")));
    }

    #[test]
    fn test_jsx_comment_in_tsx() {
        let source = "const el = <div>{/* <img src='old.png' /> */}<img src='new.png' /></div>;\n";
        let outcome = script_map(source, SourceLanguage::Tsx);
        assert!(!outcome.degraded);
        assert!(outcome.map.is_commented(offset_of(source, "old.png")));
        assert!(!outcome.map.is_commented(offset_of(source, "new.png")));
    }

    #[test]
    fn test_broken_script_falls_back_to_lexer() {
        let source = "const = = 'a.png'; // 'b.png'\n";
        let outcome = script_map(source, SourceLanguage::JavaScript);
        assert!(outcome.degraded);
        assert!(!outcome.map.is_commented(offset_of(source, "a.png")));
        assert!(outcome.map.is_commented(offset_of(source, "b.png")));
    }

    // ===== Lexical scanning =====

    #[test]
    fn test_css_block_comment_only() {
        let source = ".a { background: url(http://x/a.png); }\n/* .b { background: url(b.png); } */\n";
        let kind = SourceKind::from_extension("css").unwrap();
        let comments = scan_comments(source, kind.comment_style());
        assert_eq!(comments.len(), 1);
        let map = SyntaxMap::new(source, comments);
        assert!(!map.is_commented(offset_of(source, "a.png")));
        assert!(map.is_commented(offset_of(source, "b.png")));
    }

    #[test]
    fn test_scss_line_comment_skips_scheme() {
        let source = ".a { background: url(http://x/a.png); } // url(b.png)\n";
        let kind = SourceKind::from_extension("scss").unwrap();
        let map = SyntaxMap::new(source, scan_comments(source, kind.comment_style()));
        assert!(!map.is_commented(offset_of(source, "a.png")));
        assert!(map.is_commented(offset_of(source, "b.png")));
    }

    #[test]
    fn test_comment_delimiter_inside_string() {
        let source = "const s = \"/* not a comment */\"; const t = 'x.png';\n";
        let style = SourceKind::Script(SourceLanguage::JavaScript).comment_style();
        assert!(scan_comments(source, style).is_empty());
    }

    #[test]
    fn test_markup_comment() {
        let source = "<img src=\"a.png\">\n<!--\n<img src=\"b.png\">\n-->\n<p>Don't</p><img src=\"c.png\">\n";
        let map = SyntaxMap::new(source, scan_comments(source, SourceKind::Markup.comment_style()));
        assert!(!map.is_commented(offset_of(source, "a.png")));
        assert!(map.is_commented(offset_of(source, "b.png")));
        assert!(!map.is_commented(offset_of(source, "c.png")));
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        let source = "a('x.png'); /* a('y.png')";
        let style = SourceKind::Script(SourceLanguage::JavaScript).comment_style();
        let map = SyntaxMap::new(source, scan_comments(source, style));
        assert!(map.is_commented(offset_of(source, "y.png")));
    }

    #[test]
    fn test_line_numbers() {
        let source = "a\nbb\nccc\n";
        let map = SyntaxMap::new(source, Vec::new());
        assert_eq!(map.line_of(0), 1);
        assert_eq!(map.line_of(2), 2);
        assert_eq!(map.line_of(offset_of(source, "ccc")), 3);
    }
}
