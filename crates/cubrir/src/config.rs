//! Reporter and threshold configuration.
//!
//! Every field is optional on the wire; missing fields fall back to the
//! documented defaults (zero thresholds, the `coverage` directory, a single
//! implicit reporter). Absent configuration is never an error.

use crate::record::MetricKind;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default output directory when none is configured
pub const DEFAULT_DIR: &str = "coverage";

fn default_kind() -> String {
    "lcov".to_string()
}

/// Per-metric thresholds for one scope plus its exclusion patterns.
///
/// A threshold value of zero always passes. The sign of a threshold is the
/// discriminator: a non-negative value is a minimum acceptable percentage, a
/// negative value is a maximum acceptable count of uncovered units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeThresholds {
    /// Statement threshold
    pub statements: f64,
    /// Branch threshold
    pub branches: f64,
    /// Function threshold
    pub functions: f64,
    /// Line threshold
    pub lines: f64,
    /// Glob patterns excluded from this scope
    pub excludes: Vec<String>,
}

impl ScopeThresholds {
    /// Threshold configured for a metric kind
    #[must_use]
    pub fn threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Statements => self.statements,
            MetricKind::Branches => self.branches,
            MetricKind::Functions => self.functions,
            MetricKind::Lines => self.lines,
        }
    }
}

/// Partial thresholds selected for a file by an override rule.
///
/// Absent fields fall back to the `each` scope defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverride {
    /// Statement threshold override
    pub statements: Option<f64>,
    /// Branch threshold override
    pub branches: Option<f64>,
    /// Function threshold override
    pub functions: Option<f64>,
    /// Line threshold override
    pub lines: Option<f64>,
}

impl ThresholdOverride {
    /// Produce effective thresholds by layering this override on a base scope
    #[must_use]
    pub fn merged_over(&self, base: &ScopeThresholds) -> ScopeThresholds {
        ScopeThresholds {
            statements: self.statements.unwrap_or(base.statements),
            branches: self.branches.unwrap_or(base.branches),
            functions: self.functions.unwrap_or(base.functions),
            lines: self.lines.unwrap_or(base.lines),
            excludes: base.excludes.clone(),
        }
    }
}

/// One override rule: a glob pattern and the thresholds it selects.
///
/// Rules are kept in declaration order; resolution is first match wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Glob pattern matched against the normalized file key
    pub pattern: String,
    /// Thresholds applied to matching files
    #[serde(flatten)]
    pub thresholds: ThresholdOverride,
}

/// Per-file scope: `each` defaults plus ordered override rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EachThresholds {
    /// Default thresholds applied to every file
    #[serde(flatten)]
    pub thresholds: ScopeThresholds,
    /// Ordered per-file override rules
    pub overrides: Vec<OverrideRule>,
}

/// Threshold configuration for both scopes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Thresholds for the whole-run summary
    pub global: ScopeThresholds,
    /// Thresholds applied independently per file
    pub each: EachThresholds,
}

/// Output subdirectory: a literal name or a function of the worker name
#[derive(Clone)]
pub enum Subdir {
    /// Fixed subdirectory name
    Literal(String),
    /// Subdirectory derived from the worker name, evaluated once per worker
    PerWorker(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Subdir {
    /// Resolve the subdirectory for a worker
    #[must_use]
    pub fn resolve(&self, worker_name: &str) -> String {
        match self {
            Self::Literal(name) => name.clone(),
            Self::PerWorker(f) => f(worker_name),
        }
    }
}

impl fmt::Debug for Subdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            Self::PerWorker(_) => f.write_str("PerWorker(..)"),
        }
    }
}

impl From<&str> for Subdir {
    fn from(name: &str) -> Self {
        Self::Literal(name.to_string())
    }
}

impl Serialize for Subdir {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(name) => serializer.serialize_str(name),
            Self::PerWorker(_) => serializer.serialize_str("<per-worker>"),
        }
    }
}

impl<'de> Deserialize<'de> for Subdir {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.is_empty() {
            return Err(de::Error::custom("subdir must not be empty"));
        }
        Ok(Self::Literal(name))
    }
}

/// Configuration for one report target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Report kind, e.g. `lcov`, `json`, `text-summary`
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Output directory, shadowing the top-level `dir`
    pub dir: Option<String>,
    /// Output subdirectory, shadowing the top-level `subdir`
    pub subdir: Option<Subdir>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            dir: None,
            subdir: None,
        }
    }
}

impl ReporterConfig {
    /// Create a reporter config for a report kind
    #[must_use]
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            dir: None,
            subdir: None,
        }
    }
}

/// Top-level coverage reporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Configured report targets; absent means one implicit reporter built
    /// from the top-level fields
    pub reporters: Option<Vec<ReporterConfig>>,
    /// Default output directory for all reporters
    pub dir: Option<String>,
    /// Default output subdirectory for all reporters
    pub subdir: Option<Subdir>,
    /// Threshold configuration; absent means no checks
    pub check: Option<CheckConfig>,
    /// Base path output directories resolve against
    pub base_path: PathBuf,
}

impl CoverageConfig {
    /// The configured reporters, or the single implicit one
    #[must_use]
    pub fn effective_reporters(&self) -> Vec<ReporterConfig> {
        self.reporters.clone().unwrap_or_else(|| {
            vec![ReporterConfig {
                kind: default_kind(),
                dir: self.dir.clone(),
                subdir: self.subdir.clone(),
            }]
        })
    }

    /// Output directory for one worker and report target:
    /// `<base_path>/<dir | "coverage">/<subdir | workerName>`, with
    /// reporter-level fields shadowing the top-level ones.
    #[must_use]
    pub fn output_dir(&self, reporter: &ReporterConfig, worker_name: &str) -> PathBuf {
        let dir = reporter
            .dir
            .as_deref()
            .or(self.dir.as_deref())
            .unwrap_or(DEFAULT_DIR);
        let subdir = reporter
            .subdir
            .as_ref()
            .or(self.subdir.as_ref())
            .map_or_else(|| worker_name.to_string(), |s| s.resolve(worker_name));
        self.base_path.join(dir).join(subdir)
    }
}
