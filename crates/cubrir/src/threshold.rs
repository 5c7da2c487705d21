//! Threshold evaluation against merged coverage.
//!
//! Evaluation never terminates the process and never short-circuits: all four
//! metrics are checked for every scope, and every violation produces one log
//! line. The caller turns a non-empty violation list into run failure.

use crate::config::{CheckConfig, ScopeThresholds};
use crate::filter::{remove_files, resolve_override};
use crate::record::{summarize_file, summarize_map, CoverageMap, CoverageSummary, MetricKind};

/// One violated threshold, with everything the log line needs
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdViolation {
    /// Worker whose coverage was evaluated
    pub worker: String,
    /// Scope label, `global` or `per-file (<key>)`
    pub scope: String,
    /// Metric that violated its threshold
    pub kind: MetricKind,
    /// What was measured and what was required
    pub detail: ViolationDetail,
}

/// The measured value and the threshold it violated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViolationDetail {
    /// Covered percentage fell below the configured minimum
    BelowMinimumPct {
        /// Measured percentage
        actual: f64,
        /// Configured minimum percentage
        threshold: f64,
    },
    /// Uncovered unit count exceeded the configured maximum
    AboveUncoveredMax {
        /// Measured uncovered count
        uncovered: u64,
        /// Configured maximum uncovered count
        maximum: u64,
    },
}

impl std::fmt::Display for ThresholdViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.detail {
            ViolationDetail::BelowMinimumPct { actual, threshold } => write!(
                f,
                "{}: Coverage for {} ({}%) does not meet {} threshold ({}%)",
                self.worker, self.kind, actual, self.scope, threshold
            ),
            ViolationDetail::AboveUncoveredMax { uncovered, maximum } => write!(
                f,
                "{}: Uncovered count for {} ({}) exceeds {} threshold ({})",
                self.worker, self.kind, uncovered, self.scope, maximum
            ),
        }
    }
}

/// Evaluate one scope's summary against its thresholds.
///
/// The sign of each threshold selects the comparison: non-negative values
/// are minimum percentages (fail strictly below), negative values are
/// maximum uncovered counts (fail strictly above).
#[must_use]
pub fn evaluate_scope(
    worker: &str,
    scope: &str,
    thresholds: &ScopeThresholds,
    summary: &CoverageSummary,
) -> Vec<ThresholdViolation> {
    let mut violations = Vec::new();

    for kind in MetricKind::ALL {
        let metric = summary.metric(kind);
        let threshold = thresholds.threshold(kind);

        if threshold < 0.0 {
            let maximum = (-threshold) as u64;
            if metric.uncovered() > maximum {
                violations.push(ThresholdViolation {
                    worker: worker.to_string(),
                    scope: scope.to_string(),
                    kind,
                    detail: ViolationDetail::AboveUncoveredMax {
                        uncovered: metric.uncovered(),
                        maximum,
                    },
                });
            }
        } else if metric.pct < threshold {
            violations.push(ThresholdViolation {
                worker: worker.to_string(),
                scope: scope.to_string(),
                kind,
                detail: ViolationDetail::BelowMinimumPct {
                    actual: metric.pct,
                    threshold,
                },
            });
        }
    }

    violations
}

/// Check one worker's merged coverage against the full threshold config.
///
/// The global summary is computed over files surviving `global.excludes`;
/// per-file checks run over files surviving `each.excludes` — the two
/// exclusion sets are independent. Every violation is logged; the returned
/// list is non-empty iff any scope failed.
#[must_use]
pub fn check_coverage(
    worker: &str,
    raw: &CoverageMap,
    check: &CheckConfig,
) -> Vec<ThresholdViolation> {
    let global_summary = summarize_map(&remove_files(raw, &check.global.excludes));
    let mut violations = evaluate_scope(worker, "global", &check.global, &global_summary);

    let each_files = remove_files(raw, &check.each.thresholds.excludes);
    for (key, record) in &each_files {
        let summary = summarize_file(record);
        let effective = resolve_override(key, &check.each.overrides).map_or_else(
            || check.each.thresholds.clone(),
            |over| over.merged_over(&check.each.thresholds),
        );
        violations.extend(evaluate_scope(
            worker,
            &format!("per-file ({key})"),
            &effective,
            &summary,
        ));
    }

    for violation in &violations {
        tracing::error!(worker = %violation.worker, scope = %violation.scope, "{violation}");
    }

    violations
}
