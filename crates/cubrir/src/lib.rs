//! Cubrir: Per-Worker Coverage Aggregation and Threshold Gating
//!
//! Cubrir (Spanish: "to cover") merges code-coverage deltas streaming in
//! from concurrently-running test workers, evaluates the merged result
//! against configurable pass/fail thresholds, and hands the data to report
//! renderers — deferring process exit until every deferred write finished.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CUBRIR Architecture                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   worker events ──► CollectorRegistry ──► ThresholdEvaluator    │
//! │                          │                       │               │
//! │                    per-worker                exit code           │
//! │                   accumulators                                   │
//! │                          │                                       │
//! │                          ▼                                       │
//! │                  Renderer (per reporter × worker)                │
//! │                          │                                       │
//! │                  CompletionTracker ──► onExit(done)              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threshold checks run once per worker regardless of how many report
//! targets are configured; a failed check marks the run failed but never
//! stops sibling reports from being written.

#![warn(missing_docs)]

mod accumulator;
mod completion;
mod config;
mod filter;
mod record;
mod registry;
mod render;
mod result;
mod store;
mod threshold;

pub use accumulator::CoverageAccumulator;
pub use completion::{CompletionTracker, WriteToken};
pub use config::{
    CheckConfig, CoverageConfig, EachThresholds, OverrideRule, ReporterConfig, ScopeThresholds,
    Subdir, ThresholdOverride, DEFAULT_DIR,
};
pub use filter::{matches_any, remove_files, resolve_override};
pub use record::{
    merge_map, summarize_file, summarize_map, CoverageMap, CoverageSummary, FileCoverage,
    MetricKind, SummaryMetric,
};
pub use registry::{CollectorRegistry, RegistryState, RunResult, Worker};
pub use render::{lcov, text_summary, Renderer, StandardRenderer};
pub use result::{CubrirError, CubrirResult};
pub use store::{BasePathStore, FsStore, KeyStore, MemStore};
pub use threshold::{check_coverage, evaluate_scope, ThresholdViolation, ViolationDetail};
