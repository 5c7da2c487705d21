//! Drives the collector registry through a full simulated run: two workers
//! stream coverage deltas, thresholds are checked, and reports land under
//! `./coverage/<worker>/`.

use cubrir::{
    CheckConfig, CollectorRegistry, CoverageConfig, CoverageMap, FileCoverage, ReporterConfig,
    RunResult, ScopeThresholds, StandardRenderer, Worker,
};
use std::sync::Arc;

fn delta(key: &str, hits: &[u64]) -> CoverageMap {
    let mut map = CoverageMap::new();
    map.insert(
        key.to_string(),
        FileCoverage {
            statements: hits
                .iter()
                .enumerate()
                .map(|(i, h)| (i.to_string(), *h))
                .collect(),
            ..FileCoverage::default()
        },
    );
    map
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let config = CoverageConfig {
        reporters: Some(vec![
            ReporterConfig::of_kind("lcov"),
            ReporterConfig::of_kind("text-summary"),
        ]),
        check: Some(CheckConfig {
            global: ScopeThresholds {
                statements: 75.0,
                ..ScopeThresholds::default()
            },
            ..CheckConfig::default()
        }),
        base_path: std::env::current_dir().expect("cwd"),
        ..CoverageConfig::default()
    };

    let registry = CollectorRegistry::new(config, Arc::new(StandardRenderer::new()));

    let chrome = Worker::new("worker-1", "Chrome");
    let firefox = Worker::new("worker-2", "Firefox");

    registry.on_run_start(&[]);
    registry.on_worker_start(&chrome);
    registry.on_worker_start(&firefox);

    registry.on_spec_complete(&chrome, &delta("src/app.js", &[1, 1, 1, 0]));
    registry.on_spec_complete(&firefox, &delta("src/app.js", &[1, 1, 1, 1]));
    registry.on_spec_complete(&chrome, &delta("src/util.js", &[2, 0]));

    let mut results = RunResult::default();
    registry.on_run_complete(&[chrome, firefox], &mut results);

    let (tx, rx) = tokio::sync::oneshot::channel();
    registry.on_exit(move || {
        let _ = tx.send(());
    });
    rx.await.expect("exit callback");

    println!("run finished with exit code {}", results.exit_code);
}
