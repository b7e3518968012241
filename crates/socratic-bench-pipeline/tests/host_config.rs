// crates/socratic-bench-pipeline/tests/host_config.rs
// ============================================================================
// Module: Host Configuration Tests
// Description: Verifies TOML parsing and invoker policy threading.
// ============================================================================
//! ## Overview
//! Ensures an empty TOML document yields the default host configuration,
//! queue and invoker settings round-trip from TOML, and the model
//! allowlist/denylist fields thread into the registry access policy the
//! host installs in front of every backend invoker.

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

use socratic_bench_pipeline::HostConfig;
use socratic_bench_pipeline::InvokerMode;

#[test]
fn empty_document_yields_defaults() {
    let config = HostConfig::from_toml("").expect("parse");
    assert_eq!(config, HostConfig::default());
    assert_eq!(config.runner_concurrency, 25);
    assert_eq!(config.invoker.mode, InvokerMode::Scripted);
    assert!(config.invoker.allowed_models.is_none());
    assert!(config.invoker.denied_models.is_empty());
}

#[test]
fn queue_and_invoker_settings_round_trip_from_toml() {
    let config = HostConfig::from_toml(
        r#"
        runner_concurrency = 4

        [dialogue_queue]
        visibility_timeout_secs = 120
        max_receives = 3

        [invoker]
        mode = "http"
        endpoint = "https://models.example.test/v1/chat/completions"
        api_key_env = "MODELS_API_KEY"
        "#,
    )
    .expect("parse");

    assert_eq!(config.runner_concurrency, 4);
    assert_eq!(config.dialogue_queue.visibility_timeout_secs, 120);
    assert_eq!(config.dialogue_queue.max_receives, 3);
    assert_eq!(config.invoker.mode, InvokerMode::Http);
    assert_eq!(
        config.invoker.endpoint.as_deref(),
        Some("https://models.example.test/v1/chat/completions")
    );
}

#[test]
fn model_policy_fields_thread_into_the_access_policy() {
    let config = HostConfig::from_toml(
        r#"
        [invoker]
        allowed_models = ["tutor-small", "tutor-large"]
        denied_models = ["tutor-large"]
        "#,
    )
    .expect("parse");

    let policy = config.invoker.access_policy();
    assert!(policy.is_allowed("tutor-small"));
    assert!(!policy.is_allowed("tutor-large"), "denylist overrides allowlist");
    assert!(!policy.is_allowed("unlisted-model"), "allowlist excludes unlisted models");
}

#[test]
fn absent_allowlist_permits_everything_not_denied() {
    let config = HostConfig::from_toml(
        r#"
        [invoker]
        denied_models = ["blocked-model"]
        "#,
    )
    .expect("parse");

    let policy = config.invoker.access_policy();
    assert!(policy.is_allowed("any-model"));
    assert!(!policy.is_allowed("blocked-model"));
}
