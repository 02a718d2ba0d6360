//! Byte counts and their human-readable forms.

use serde::{Deserialize, Serialize};

/// Format a size in bytes to a human-readable string.
///
/// Bytes below 1 KiB are exact, kilobytes round to whole units and larger
/// sizes keep two decimals: `512 B`, `620 KB`, `2.16 MB`. The unit is picked
/// after rounding, so a value never prints as 1024 of the smaller unit.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let bytes = bytes as f64;
    let kb = (bytes / KB).round();
    if kb < 1024.0 {
        return format!("{:.0} KB", kb);
    }
    let mb = (bytes / MB * 100.0).round() / 100.0;
    if mb < 1024.0 {
        return format!("{:.2} MB", mb);
    }
    format!("{:.2} GB", bytes / GB)
}

/// Percentage reduction from `before` to `after`, rounded to two decimals.
///
/// Zero when `before` is zero.
pub fn saved_percentage(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    let saved = before.saturating_sub(after) as f64;
    (saved / before as f64 * 10_000.0).round() / 100.0
}

/// A file count with its total size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSummary {
    pub files: usize,
    pub size_bytes: u64,
    pub size_human: String,
}

impl SizeSummary {
    pub fn new(files: usize, size_bytes: u64) -> Self {
        Self {
            files,
            size_bytes,
            size_human: format_size(size_bytes),
        }
    }
}

impl std::fmt::Display for SizeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} files, {}", self.files, self.size_human)
    }
}
