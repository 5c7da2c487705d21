//! Report rendering seam and built-in text renderers.
//!
//! The registry only knows the [`Renderer`] contract; HTML and other rich
//! report engines plug in from outside. The built-in [`StandardRenderer`]
//! covers the text formats: LCOV, JSON, and a plain summary.

use crate::config::ReporterConfig;
use crate::record::{summarize_map, CoverageMap, MetricKind};
use crate::result::CubrirResult;
use crate::store::BasePathStore;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::Path;

/// Contract for turning merged coverage into report files.
///
/// A render may fail; the registry logs the failure and carries on with
/// sibling renders. Implementations must not assume any ordering between
/// renders of different worker/reporter pairs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Write one report for one worker into the resolved output directory
    async fn render(
        &self,
        reporter: &ReporterConfig,
        coverage: &CoverageMap,
        out_dir: &Path,
        sources: &BasePathStore,
    ) -> CubrirResult<()>;
}

/// Built-in renderer dispatching on the reporter kind.
///
/// Unknown kinds fall back to LCOV.
#[derive(Debug, Default)]
pub struct StandardRenderer;

impl StandardRenderer {
    /// Create the built-in renderer
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for StandardRenderer {
    async fn render(
        &self,
        reporter: &ReporterConfig,
        coverage: &CoverageMap,
        out_dir: &Path,
        _sources: &BasePathStore,
    ) -> CubrirResult<()> {
        let (file_name, contents) = match reporter.kind.as_str() {
            "json" => (
                "coverage-final.json",
                serde_json::to_string_pretty(coverage)?,
            ),
            "text-summary" => ("coverage-summary.txt", text_summary(coverage)),
            _ => ("lcov.info", lcov(coverage)),
        };
        tokio::fs::write(out_dir.join(file_name), contents).await?;
        Ok(())
    }
}

/// Render the merged map in LCOV trace format
#[must_use]
pub fn lcov(coverage: &CoverageMap) -> String {
    let mut output = String::new();

    for (key, record) in coverage {
        let _ = writeln!(output, "TN:");
        let _ = writeln!(output, "SF:{key}");

        let mut functions_hit = 0usize;
        for (id, count) in &record.functions {
            let _ = writeln!(output, "FNDA:{count},{id}");
            if *count > 0 {
                functions_hit += 1;
            }
        }
        let _ = writeln!(output, "FNF:{}", record.functions.len());
        let _ = writeln!(output, "FNH:{functions_hit}");

        // DA lines in numeric order where the keys parse as line numbers
        let mut lines: Vec<(u64, u64)> = record
            .lines
            .iter()
            .filter_map(|(line, count)| line.parse::<u64>().ok().map(|l| (l, *count)))
            .collect();
        lines.sort_unstable();

        let mut lines_hit = 0usize;
        for (line, count) in &lines {
            let _ = writeln!(output, "DA:{line},{count}");
            if *count > 0 {
                lines_hit += 1;
            }
        }
        let _ = writeln!(output, "LF:{}", lines.len());
        let _ = writeln!(output, "LH:{lines_hit}");

        let branch_total: usize = record.branches.values().map(Vec::len).sum();
        let branch_hit: usize = record
            .branches
            .values()
            .flatten()
            .filter(|&&c| c > 0)
            .count();
        let _ = writeln!(output, "BRF:{branch_total}");
        let _ = writeln!(output, "BRH:{branch_hit}");

        output.push_str("end_of_record\n");
    }

    output
}

/// Render the four summary metrics as plain text
#[must_use]
pub fn text_summary(coverage: &CoverageMap) -> String {
    let summary = summarize_map(coverage);
    let mut output = String::from("Coverage summary\n");
    for kind in MetricKind::ALL {
        let metric = summary.metric(kind);
        let _ = writeln!(
            output,
            "  {kind:<11}: {:.2}% ({}/{})",
            metric.pct, metric.covered, metric.total
        );
    }
    output
}
