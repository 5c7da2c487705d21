//! Coverage records and derived summaries.
//!
//! Workers emit per-file hit counts as JSON deltas. A [`FileCoverage`] holds
//! the raw counts for one file; a [`CoverageSummary`] is derived from the raw
//! data on demand and never stored alongside it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping from file key to its raw coverage record
pub type CoverageMap = BTreeMap<String, FileCoverage>;

/// The four metric kinds evaluated against thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Statement coverage
    Statements,
    /// Branch coverage
    Branches,
    /// Function coverage
    Functions,
    /// Line coverage
    Lines,
}

impl MetricKind {
    /// All metric kinds, in evaluation order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Statements,
        MetricKind::Branches,
        MetricKind::Lines,
        MetricKind::Functions,
    ];
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Statements => write!(f, "statements"),
            Self::Branches => write!(f, "branches"),
            Self::Functions => write!(f, "functions"),
            Self::Lines => write!(f, "lines"),
        }
    }
}

/// Raw per-file coverage record
///
/// Field names follow the wire format produced by instrumented workers:
/// `s`tatements, `b`ranches (one hit count per arm), `f`unctions, `l`ines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Statement hit counts, keyed by statement id
    #[serde(default, rename = "s")]
    pub statements: BTreeMap<String, u64>,
    /// Branch arm hit counts, keyed by branch id
    #[serde(default, rename = "b")]
    pub branches: BTreeMap<String, Vec<u64>>,
    /// Function hit counts, keyed by function id
    #[serde(default, rename = "f")]
    pub functions: BTreeMap<String, u64>,
    /// Line hit counts, keyed by line number
    #[serde(default, rename = "l")]
    pub lines: BTreeMap<String, u64>,
}

impl FileCoverage {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another record into this one by pointwise addition.
    ///
    /// Merging is commutative and associative, so the merged state is
    /// independent of delta arrival order.
    pub fn merge(&mut self, other: &FileCoverage) {
        for (id, count) in &other.statements {
            let slot = self.statements.entry(id.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        for (id, count) in &other.functions {
            let slot = self.functions.entry(id.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        for (line, count) in &other.lines {
            let slot = self.lines.entry(line.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        for (id, arms) in &other.branches {
            let slot = self.branches.entry(id.clone()).or_default();
            if slot.len() < arms.len() {
                slot.resize(arms.len(), 0);
            }
            for (i, count) in arms.iter().enumerate() {
                slot[i] = slot[i].saturating_add(*count);
            }
        }
    }
}

/// Merge an incoming delta map into an accumulated map
pub fn merge_map(into: &mut CoverageMap, delta: &CoverageMap) {
    for (key, record) in delta {
        into.entry(key.clone()).or_default().merge(record);
    }
}

/// Derived totals for one metric kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetric {
    /// Total number of units
    pub total: u64,
    /// Units with at least one hit
    pub covered: u64,
    /// Covered percentage, 100.0 when there are no units
    pub pct: f64,
}

impl SummaryMetric {
    /// Compute the metric from unit totals
    #[must_use]
    pub fn new(total: u64, covered: u64) -> Self {
        let pct = if total == 0 {
            100.0
        } else {
            (covered as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        Self {
            total,
            covered,
            pct,
        }
    }

    /// Number of units never hit
    #[must_use]
    pub fn uncovered(&self) -> u64 {
        self.total - self.covered
    }
}

/// Derived summary over the four metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Statement totals
    pub statements: SummaryMetric,
    /// Branch totals (every arm counts as a unit)
    pub branches: SummaryMetric,
    /// Function totals
    pub functions: SummaryMetric,
    /// Line totals
    pub lines: SummaryMetric,
}

impl CoverageSummary {
    /// Look up the metric for a kind
    #[must_use]
    pub fn metric(&self, kind: MetricKind) -> SummaryMetric {
        match kind {
            MetricKind::Statements => self.statements,
            MetricKind::Branches => self.branches,
            MetricKind::Functions => self.functions,
            MetricKind::Lines => self.lines,
        }
    }
}

fn count_hits(map: &BTreeMap<String, u64>) -> (u64, u64) {
    let total = map.len() as u64;
    let covered = map.values().filter(|&&c| c > 0).count() as u64;
    (total, covered)
}

/// Summarize one file's raw record
#[must_use]
pub fn summarize_file(record: &FileCoverage) -> CoverageSummary {
    let (st, sc) = count_hits(&record.statements);
    let (ft, fc) = count_hits(&record.functions);
    let (lt, lc) = count_hits(&record.lines);

    let mut branch_total = 0u64;
    let mut branch_covered = 0u64;
    for arms in record.branches.values() {
        branch_total += arms.len() as u64;
        branch_covered += arms.iter().filter(|&&c| c > 0).count() as u64;
    }

    CoverageSummary {
        statements: SummaryMetric::new(st, sc),
        branches: SummaryMetric::new(branch_total, branch_covered),
        functions: SummaryMetric::new(ft, fc),
        lines: SummaryMetric::new(lt, lc),
    }
}

/// Summarize a whole coverage map by accumulating per-file totals
#[must_use]
pub fn summarize_map(map: &CoverageMap) -> CoverageSummary {
    let mut totals = [(0u64, 0u64); 4];
    for record in map.values() {
        let summary = summarize_file(record);
        for (slot, kind) in totals.iter_mut().zip(MetricKind::ALL) {
            let metric = summary.metric(kind);
            slot.0 += metric.total;
            slot.1 += metric.covered;
        }
    }
    let metric_at = |i: usize| {
        let (total, covered): (u64, u64) = totals[i];
        SummaryMetric::new(total, covered)
    };
    CoverageSummary {
        statements: metric_at(0),
        branches: metric_at(1),
        lines: metric_at(2),
        functions: metric_at(3),
    }
}
