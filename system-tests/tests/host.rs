// system-tests/tests/host.rs
// ============================================================================
// Module: Pipeline Host Tests
// Description: Runs the threaded worker host end to end on local substrates.
// ============================================================================
//! ## Overview
//! Builds the production host (SQLite file index, filesystem blobs, worker
//! pools with per-component caps), plans the demo configuration, and waits
//! for the workers to carry one run through dialogue, judgment, and
//! curation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::thread;
use std::time::Duration;
use std::time::Instant;

use socratic_bench_core::RunStatus;
use socratic_bench_core::catalog;
use socratic_bench_pipeline::HostConfig;
use socratic_bench_pipeline::PipelineHost;
use system_tests::single_model_config;

#[test]
fn threaded_host_completes_a_run_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scenario_file = dir.path().join("scenarios.json");
    std::fs::write(
        &scenario_file,
        serde_json::to_vec(&vec![system_tests::scenario_with_target(1)]).expect("scenarios"),
    )
    .expect("write scenarios");

    let config = HostConfig {
        data_dir: dir.path().join("data"),
        scenario_file: Some(scenario_file),
        runner_concurrency: 2,
        judge_concurrency: 2,
        curator_concurrency: 1,
        ..HostConfig::default()
    };
    let host = PipelineHost::build(config).expect("host");

    // Seed the active configuration through the host's blob tier by
    // triggering against a written config file.
    let index = host.index();
    let config_bytes = serde_json::to_vec(&single_model_config(3)).expect("config bytes");
    std::fs::create_dir_all(dir.path().join("data/blobs/config")).expect("config dir");
    std::fs::write(dir.path().join("data/blobs").join(catalog::ACTIVE_CONFIG_PATH), config_bytes)
        .expect("write config");

    let outcome = host.plan(false).expect("plan");
    assert_eq!(outcome.runs_created, 1);
    assert_eq!(outcome.enqueue_failures, 0);

    let workers = host.start_workers();
    let run_id = {
        let runs = index.query_runs_by_model(system_tests::MODEL).expect("runs");
        assert_eq!(runs.len(), 1);
        catalog::decode_run(&runs[0]).expect("run decode").run_id
    };

    // Wait for the run to complete and curation to land.
    let deadline = Instant::now() + Duration::from_secs(20);
    let summary = loop {
        if let Some(inspection) = host.inspect_run(&run_id).expect("inspect") {
            if inspection.run.status == RunStatus::Completed
                && let Some(summary) = inspection.summary
            {
                break summary;
            }
        }
        assert!(Instant::now() < deadline, "run did not complete in time");
        thread::sleep(Duration::from_millis(100));
    };
    workers.shutdown();

    assert_eq!(summary.turn_count, 1);
    assert_eq!(summary.total_output_tokens, 18);

    let depths = host.queue_depths();
    assert_eq!(depths.dialogue_dead, 0);
    assert_eq!(depths.judgment_dead, 0);

    let snapshot = host.metrics_snapshot();
    assert!(snapshot.curations >= 1);
    assert!(snapshot.runner.handler_ok >= 1);
}
