//! Worker collector registry and run lifecycle.
//!
//! One registry instance owns all per-worker accumulators for a run. Host
//! lifecycle events feed coverage deltas in; on run completion the registry
//! evaluates thresholds once per worker, schedules one render per configured
//! reporter per worker, and defers process exit until every render finished.

use crate::accumulator::CoverageAccumulator;
use crate::completion::CompletionTracker;
use crate::config::{CoverageConfig, ReporterConfig};
use crate::record::CoverageMap;
use crate::render::Renderer;
use crate::store::{BasePathStore, FsStore};
use crate::threshold::check_coverage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// An independent test-execution context producing its own coverage stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Worker {
    /// Stable identifier used to key the accumulator
    pub id: String,
    /// Human-readable name used in logs and output paths
    pub name: String,
}

impl Worker {
    /// Create a worker identity
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Mutable run outcome shared with the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Process exit code; threshold failure sets it to 1
    pub exit_code: i32,
}

/// Registry lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No run has started
    Uninitialized,
    /// A run is in progress; events mutate accumulators
    Active,
    /// Run completed; renders are in flight
    Draining,
    /// All renders finished; accumulators are disposed
    Disposed,
}

struct Inner {
    state: RegistryState,
    collectors: HashMap<String, CoverageAccumulator>,
}

impl Inner {
    fn dispose(&mut self) {
        for accumulator in self.collectors.values_mut() {
            accumulator.dispose();
        }
        self.collectors.clear();
        self.state = RegistryState::Disposed;
    }
}

/// Caches the pass/fail outcome so each worker is checked at most once per
/// run, no matter how many report targets are configured.
#[derive(Debug, Default)]
pub(crate) struct CheckCache {
    outcomes: HashMap<String, bool>,
}

impl CheckCache {
    pub(crate) fn failed_for(
        &mut self,
        worker_id: &str,
        evaluate: impl FnOnce() -> bool,
    ) -> bool {
        if let Some(&failed) = self.outcomes.get(worker_id) {
            return failed;
        }
        let failed = evaluate();
        let _ = self.outcomes.insert(worker_id.to_string(), failed);
        failed
    }
}

struct RenderJob {
    reporter: ReporterConfig,
    worker_name: String,
    coverage: CoverageMap,
    out_dir: PathBuf,
}

/// Owns per-worker accumulators and drives threshold checks and report
/// scheduling across the run lifecycle.
///
/// The registry is explicitly constructed and torn down; lifecycle hooks take
/// a shared reference so the host can hold one handle across callbacks.
pub struct CollectorRegistry {
    config: CoverageConfig,
    renderer: Arc<dyn Renderer>,
    tracker: CompletionTracker,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("state", &self.state())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Create a registry for one run configuration and an injected renderer
    #[must_use]
    pub fn new(config: CoverageConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config,
            renderer,
            tracker: CompletionTracker::new(),
            inner: Arc::new(Mutex::new(Inner {
                state: RegistryState::Uninitialized,
                collectors: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> RegistryState {
        self.lock().state
    }

    /// Number of renders still in flight
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.tracker.pending()
    }

    /// Whether a worker currently has a live accumulator
    #[must_use]
    pub fn has_collector(&self, worker_id: &str) -> bool {
        self.lock().collectors.contains_key(worker_id)
    }

    /// Begin a run: reset all accumulators and arm disposal.
    ///
    /// Workers supplied up front get accumulators immediately; workers
    /// connecting later are covered by [`Self::on_worker_start`].
    pub fn on_run_start(&self, workers: &[Worker]) {
        {
            let mut inner = self.lock();
            inner.state = RegistryState::Active;
            inner.collectors.clear();
            for worker in workers {
                let _ = inner
                    .collectors
                    .insert(worker.id.clone(), CoverageAccumulator::new(&worker.id));
            }
        }
        let drain_inner = Arc::clone(&self.inner);
        self.tracker.set_drain_hook(move || {
            drain_inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .dispose();
        });
    }

    /// A worker connected: give it a fresh accumulator, discarding any prior
    /// one for the same id.
    pub fn on_worker_start(&self, worker: &Worker) {
        let mut inner = self.lock();
        if inner.state != RegistryState::Active {
            return;
        }
        let _ = inner
            .collectors
            .insert(worker.id.clone(), CoverageAccumulator::new(&worker.id));
    }

    /// A spec finished: merge its coverage delta into the worker's
    /// accumulator. Events for unknown workers are stale and dropped.
    pub fn on_spec_complete(&self, worker: &Worker, delta: &CoverageMap) {
        let mut inner = self.lock();
        if let Some(accumulator) = inner.collectors.get_mut(&worker.id) {
            accumulator.add(delta);
        }
    }

    /// A worker finished: merge its final coverage delta, if it carried one.
    pub fn on_worker_complete(&self, worker: &Worker, delta: Option<&CoverageMap>) {
        let Some(delta) = delta else { return };
        self.on_spec_complete(worker, delta);
    }

    /// The run finished: check thresholds once per worker and schedule one
    /// render per reporter per worker.
    ///
    /// Threshold failure for any worker sets `results.exit_code` to 1 but
    /// never prevents renders from being scheduled, for that worker or any
    /// other. Must be called within a tokio runtime; renders complete as
    /// independent tasks and are awaited through [`Self::on_exit`].
    pub fn on_run_complete(&self, workers: &[Worker], results: &mut RunResult) {
        let reporters = self.config.effective_reporters();
        let mut check_cache = CheckCache::default();
        let mut any_failed = false;
        let mut jobs = Vec::new();

        {
            let mut inner = self.lock();
            inner.state = RegistryState::Draining;

            for reporter in &reporters {
                for worker in workers {
                    let Some(accumulator) = inner.collectors.get(&worker.id) else {
                        continue;
                    };

                    if let Some(check) = &self.config.check {
                        let failed = check_cache.failed_for(&worker.id, || {
                            !check_coverage(&worker.name, accumulator.files(), check).is_empty()
                        });
                        any_failed |= failed;
                    }

                    jobs.push(RenderJob {
                        reporter: reporter.clone(),
                        worker_name: worker.name.clone(),
                        coverage: accumulator.final_coverage(),
                        out_dir: self.config.output_dir(reporter, &worker.name),
                    });
                }
            }

            if jobs.is_empty() {
                // Nothing will be written, so nothing defers disposal.
                inner.dispose();
            }
        }

        // Every token is taken before any task is spawned, so the pending
        // count cannot transiently hit zero while scheduling is underway.
        let tokens: Vec<_> = jobs.iter().map(|_| self.tracker.schedule()).collect();

        for (job, token) in jobs.into_iter().zip(tokens) {
            let renderer = Arc::clone(&self.renderer);
            let base_path = self.config.base_path.clone();
            let _ = tokio::spawn(async move {
                tracing::debug!("Writing coverage to {}", job.out_dir.display());
                let sources = BasePathStore::new(base_path, Box::new(FsStore::new()));
                let outcome = async {
                    tokio::fs::create_dir_all(&job.out_dir).await?;
                    renderer
                        .render(&job.reporter, &job.coverage, &job.out_dir, &sources)
                        .await
                }
                .await;
                if let Err(error) = outcome {
                    tracing::error!(
                        worker = %job.worker_name,
                        reporter = %job.reporter.kind,
                        "Coverage render failed: {error}"
                    );
                }
                token.complete();
            });
        }

        if any_failed {
            results.exit_code = 1;
        }
    }

    /// Defer `done` until every scheduled render has finished.
    ///
    /// Fires immediately when nothing is pending, exactly once otherwise.
    pub fn on_exit(&self, done: impl FnOnce() + Send + 'static) {
        self.tracker.on_idle(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckConfig, ScopeThresholds};
    use crate::record::FileCoverage;
    use crate::result::{CubrirError, CubrirResult};
    use async_trait::async_trait;
    use std::path::Path;

    fn delta(key: &str, hits: &[u64]) -> CoverageMap {
        let mut map = CoverageMap::new();
        let record = FileCoverage {
            statements: hits
                .iter()
                .enumerate()
                .map(|(i, h)| (i.to_string(), *h))
                .collect(),
            ..FileCoverage::default()
        };
        map.insert(key.to_string(), record);
        map
    }

    #[derive(Default)]
    struct RecordingRenderer {
        renders: Mutex<Vec<(String, PathBuf)>>,
        fail_for_worker_dir: Option<String>,
    }

    impl RecordingRenderer {
        fn failing_for(worker_dir: &str) -> Self {
            Self {
                renders: Mutex::new(Vec::new()),
                fail_for_worker_dir: Some(worker_dir.to_string()),
            }
        }

        fn rendered(&self) -> Vec<(String, PathBuf)> {
            self.renders.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Renderer for RecordingRenderer {
        async fn render(
            &self,
            reporter: &ReporterConfig,
            _coverage: &CoverageMap,
            out_dir: &Path,
            _sources: &BasePathStore,
        ) -> CubrirResult<()> {
            self.renders
                .lock()
                .unwrap()
                .push((reporter.kind.clone(), out_dir.to_path_buf()));
            if let Some(marker) = &self.fail_for_worker_dir {
                if out_dir.to_string_lossy().contains(marker.as_str()) {
                    return Err(CubrirError::Render {
                        worker: marker.clone(),
                        message: "disk full".to_string(),
                    });
                }
            }
            Ok(())
        }
    }

    fn registry_with(
        config: CoverageConfig,
        renderer: Arc<RecordingRenderer>,
    ) -> CollectorRegistry {
        CollectorRegistry::new(config, renderer)
    }

    async fn wait_for_exit(registry: &CollectorRegistry) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry.on_exit(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
    }

    fn two_reporter_config(base: &Path) -> CoverageConfig {
        CoverageConfig {
            reporters: Some(vec![
                ReporterConfig::of_kind("lcov"),
                ReporterConfig::of_kind("json"),
            ]),
            base_path: base.to_path_buf(),
            ..CoverageConfig::default()
        }
    }

    #[test]
    fn events_before_run_start_are_ignored() {
        let registry = registry_with(CoverageConfig::default(), Arc::default());
        let worker = Worker::new("w1", "Chrome");

        registry.on_worker_start(&worker);
        registry.on_spec_complete(&worker, &delta("a.js", &[1]));

        assert_eq!(registry.state(), RegistryState::Uninitialized);
        assert!(!registry.has_collector("w1"));
    }

    #[test]
    fn run_start_precreates_accumulators_for_known_workers() {
        let registry = registry_with(CoverageConfig::default(), Arc::default());
        registry.on_run_start(&[Worker::new("w1", "Chrome"), Worker::new("w2", "Firefox")]);

        assert_eq!(registry.state(), RegistryState::Active);
        assert!(registry.has_collector("w1"));
        assert!(registry.has_collector("w2"));
    }

    #[test]
    fn worker_restart_discards_prior_coverage() {
        let registry = registry_with(CoverageConfig::default(), Arc::default());
        let worker = Worker::new("w1", "Chrome");
        registry.on_run_start(&[]);
        registry.on_worker_start(&worker);
        registry.on_spec_complete(&worker, &delta("a.js", &[1]));

        registry.on_worker_start(&worker);

        let inner = registry.lock();
        assert!(inner.collectors["w1"].files().is_empty());
    }

    #[test]
    fn stale_coverage_for_unknown_worker_is_dropped() {
        let registry = registry_with(CoverageConfig::default(), Arc::default());
        registry.on_run_start(&[]);
        // Never raises, never creates an accumulator.
        registry.on_spec_complete(&Worker::new("ghost", "Ghost"), &delta("a.js", &[1]));
        assert!(!registry.has_collector("ghost"));
    }

    #[test]
    fn check_cache_evaluates_each_worker_once() {
        let mut cache = CheckCache::default();
        let mut evaluations = 0;
        for _ in 0..3 {
            let failed = cache.failed_for("w1", || {
                evaluations += 1;
                true
            });
            assert!(failed);
        }
        assert_eq!(evaluations, 1);

        assert!(!cache.failed_for("w2", || false));
        assert_eq!(evaluations, 1);
    }

    #[tokio::test]
    async fn two_reporters_one_worker_schedules_two_renders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let registry = registry_with(two_reporter_config(dir.path()), Arc::clone(&renderer));

        let worker = Worker::new("w1", "Chrome");
        registry.on_run_start(&[]);
        registry.on_worker_start(&worker);
        registry.on_spec_complete(&worker, &delta("a.js", &[1, 0]));

        let mut results = RunResult::default();
        registry.on_run_complete(std::slice::from_ref(&worker), &mut results);
        wait_for_exit(&registry).await;

        let rendered = renderer.rendered();
        assert_eq!(rendered.len(), 2);
        let kinds: Vec<&str> = rendered.iter().map(|(k, _)| k.as_str()).collect();
        assert!(kinds.contains(&"lcov"));
        assert!(kinds.contains(&"json"));
        assert_eq!(results.exit_code, 0);
    }

    #[tokio::test]
    async fn threshold_failure_sets_exit_code_but_reports_still_render() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = two_reporter_config(dir.path());
        config.check = Some(CheckConfig {
            global: ScopeThresholds {
                statements: 81.0,
                ..ScopeThresholds::default()
            },
            ..CheckConfig::default()
        });
        let renderer = Arc::new(RecordingRenderer::default());
        let registry = registry_with(config, Arc::clone(&renderer));

        let worker = Worker::new("w1", "Chrome");
        registry.on_run_start(&[]);
        registry.on_worker_start(&worker);
        // 8 of 10 statements: 80% < 81%
        registry.on_spec_complete(&worker, &delta("a.js", &[1, 1, 1, 1, 1, 1, 1, 1, 0, 0]));

        let mut results = RunResult::default();
        registry.on_run_complete(std::slice::from_ref(&worker), &mut results);
        wait_for_exit(&registry).await;

        assert_eq!(results.exit_code, 1);
        assert_eq!(renderer.rendered().len(), 2);
    }

    #[tokio::test]
    async fn render_failure_does_not_abort_siblings_or_exit() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::failing_for("Chrome"));
        let config = CoverageConfig {
            base_path: dir.path().to_path_buf(),
            ..CoverageConfig::default()
        };
        let registry = registry_with(config, Arc::clone(&renderer));

        let workers = [Worker::new("w1", "Chrome"), Worker::new("w2", "Firefox")];
        registry.on_run_start(&workers);
        registry.on_spec_complete(&workers[0], &delta("a.js", &[1]));
        registry.on_spec_complete(&workers[1], &delta("a.js", &[1]));

        let mut results = RunResult::default();
        registry.on_run_complete(&workers, &mut results);
        wait_for_exit(&registry).await;

        // Both renders ran; the Chrome failure was logged, not escalated.
        assert_eq!(renderer.rendered().len(), 2);
        assert_eq!(results.exit_code, 0);
        assert_eq!(registry.state(), RegistryState::Disposed);
    }

    #[tokio::test]
    async fn disposal_follows_last_render_and_clears_collectors() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(RecordingRenderer::default());
        let config = CoverageConfig {
            base_path: dir.path().to_path_buf(),
            ..CoverageConfig::default()
        };
        let registry = registry_with(config, Arc::clone(&renderer));

        let worker = Worker::new("w1", "Chrome");
        registry.on_run_start(&[]);
        registry.on_worker_start(&worker);
        registry.on_spec_complete(&worker, &delta("a.js", &[1]));

        let mut results = RunResult::default();
        registry.on_run_complete(std::slice::from_ref(&worker), &mut results);
        assert_eq!(registry.state(), RegistryState::Draining);

        wait_for_exit(&registry).await;
        assert_eq!(registry.state(), RegistryState::Disposed);
        assert!(!registry.has_collector("w1"));
        assert_eq!(registry.pending_writes(), 0);
    }

    #[tokio::test]
    async fn run_complete_without_collectors_disposes_immediately() {
        let registry = registry_with(CoverageConfig::default(), Arc::default());
        registry.on_run_start(&[]);

        let mut results = RunResult::default();
        registry.on_run_complete(&[Worker::new("w1", "Chrome")], &mut results);

        assert_eq!(registry.state(), RegistryState::Disposed);
        wait_for_exit(&registry).await;
    }
}
