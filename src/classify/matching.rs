//! Reference-to-asset matching rules.

use crate::analysis::{MatchMode, Reference};
use crate::config::MatchPolicy;
use crate::inventory::Asset;

/// Characters that may continue a file name. A match bordered by one of these
/// is part of a longer, different name.
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '+' | '~')
}

/// Returns true if `file_name` occurs in `text` as a whole name.
///
/// `Button.png` matches `assets/Button.png` and `"Button.png"`, but not
/// `Button-min.png` or `MyButton.png`. Case-sensitive.
pub fn contains_file_name(text: &str, file_name: &str) -> bool {
    if file_name.is_empty() {
        return false;
    }
    text.match_indices(file_name).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + file_name.len()..].chars().next();
        !before.is_some_and(is_name_char) && !after.is_some_and(is_name_char)
    })
}

/// Returns true if `reference` names `asset` under the given policy.
pub fn reference_matches(reference: &Reference, asset: &Asset, policy: MatchPolicy) -> bool {
    match (policy, reference.match_mode) {
        (_, MatchMode::Exact) => reference.target == asset.path,
        (MatchPolicy::Dual, MatchMode::Substring) => {
            contains_file_name(&reference.target, asset.file_name())
        }
        // Project-rooted fragments like `assets/a.png` still count as exact paths
        (MatchPolicy::ExactOnly, MatchMode::Substring) => reference.target == asset.path,
    }
}
