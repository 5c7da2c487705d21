//! Glob-based exclusion and per-file override resolution.

use crate::config::{OverrideRule, ThresholdOverride};
use crate::record::CoverageMap;
use glob::{MatchOptions, Pattern};

/// Match options for coverage keys: dot-files are ordinary files, single
/// wildcards stay within one path component (`**` crosses components).
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Normalize a coverage key for matching (Windows separators become `/`)
fn normalize(key: &str) -> String {
    key.replace('\\', "/")
}

fn pattern_matches(pattern: &str, normalized_key: &str) -> bool {
    // An unparsable pattern excludes nothing.
    Pattern::new(pattern).is_ok_and(|p| p.matches_with(normalized_key, match_options()))
}

/// Whether any pattern matches the normalized key
#[must_use]
pub fn matches_any(key: &str, patterns: &[String]) -> bool {
    let normalized = normalize(key);
    patterns.iter().any(|p| pattern_matches(p, &normalized))
}

/// Return the subset of the map whose keys match no exclusion pattern.
///
/// An empty pattern set yields an identity copy.
#[must_use]
pub fn remove_files(map: &CoverageMap, patterns: &[String]) -> CoverageMap {
    map.iter()
        .filter(|(key, _)| !matches_any(key, patterns))
        .map(|(key, record)| (key.clone(), record.clone()))
        .collect()
}

/// Resolve the threshold override for a key against ordered override rules.
///
/// First declared match wins; later matches are ignored even if more
/// specific. No match means every field falls back to the scope defaults.
#[must_use]
pub fn resolve_override<'a>(
    key: &str,
    overrides: &'a [OverrideRule],
) -> Option<&'a ThresholdOverride> {
    let normalized = normalize(key);
    overrides
        .iter()
        .find(|rule| pattern_matches(&rule.pattern, &normalized))
        .map(|rule| &rule.thresholds)
}
