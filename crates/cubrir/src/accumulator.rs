//! Per-worker coverage accumulation.

use crate::record::{merge_map, CoverageMap};

/// Mutable merge of all coverage deltas contributed by one worker.
///
/// Created on worker start, fed by every coverage-bearing event for that
/// worker, and disposed once all report targets for the worker have been
/// written. Deltas commute, so the merged state does not depend on event
/// arrival order.
#[derive(Debug)]
pub struct CoverageAccumulator {
    worker_id: String,
    files: CoverageMap,
    disposed: bool,
}

impl CoverageAccumulator {
    /// Create an empty accumulator for a worker
    #[must_use]
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            files: CoverageMap::new(),
            disposed: false,
        }
    }

    /// Identity of the contributing worker
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Merge a coverage delta into the accumulated state.
    ///
    /// Deltas arriving after disposal are dropped.
    pub fn add(&mut self, delta: &CoverageMap) {
        if self.disposed {
            return;
        }
        merge_map(&mut self.files, delta);
    }

    /// The accumulated coverage so far
    #[must_use]
    pub fn files(&self) -> &CoverageMap {
        &self.files
    }

    /// Snapshot of the final merged coverage for report rendering
    #[must_use]
    pub fn final_coverage(&self) -> CoverageMap {
        self.files.clone()
    }

    /// Release the accumulated state
    pub fn dispose(&mut self) {
        self.files.clear();
        self.disposed = true;
    }

    /// Whether the accumulator has been disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileCoverage;

    fn delta(key: &str, statement_hits: &[u64]) -> CoverageMap {
        let mut map = CoverageMap::new();
        let record = FileCoverage {
            statements: statement_hits
                .iter()
                .enumerate()
                .map(|(i, h)| (i.to_string(), *h))
                .collect(),
            ..FileCoverage::default()
        };
        map.insert(key.to_string(), record);
        map
    }

    #[test]
    fn deltas_accumulate_across_events() {
        let mut acc = CoverageAccumulator::new("w1");
        acc.add(&delta("a.js", &[1, 0]));
        acc.add(&delta("a.js", &[0, 2]));
        acc.add(&delta("b.js", &[1]));

        assert_eq!(acc.files()["a.js"].statements["0"], 1);
        assert_eq!(acc.files()["a.js"].statements["1"], 2);
        assert_eq!(acc.files().len(), 2);
    }

    #[test]
    fn dispose_releases_state_and_drops_late_deltas() {
        let mut acc = CoverageAccumulator::new("w1");
        acc.add(&delta("a.js", &[1]));
        acc.dispose();

        assert!(acc.is_disposed());
        assert!(acc.files().is_empty());

        acc.add(&delta("a.js", &[1]));
        assert!(acc.files().is_empty());
    }
}
