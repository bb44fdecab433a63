/// Integration tests for validation chains
///
/// Auto-advance, halting on required failures, optional steps, context
/// threading, custom recovery, callbacks and chain scripts.
mod common;

use common::*;
use recovery_chain::context::keys;
use recovery_chain::recovery::{FailureCategory, RecoveryResult, ValidationOutcome};
use recovery_chain::{ChainScript, Context, Failure, ValidationChain, ValidationStep};
use std::sync::{Arc, Mutex};

fn always_fails(name: &str, calls: Counter) -> ValidationStep {
    ValidationStep::new(name, move |_ctx: Context| {
        let calls = calls.clone();
        async move {
            calls.bump();
            Ok(ValidationOutcome::failed("something odd"))
        }
    })
}

fn always_passes(name: &str, calls: Counter) -> ValidationStep {
    ValidationStep::new(name, move |_ctx: Context| {
        let calls = calls.clone();
        async move {
            calls.bump();
            Ok(ValidationOutcome::passed())
        }
    })
}

#[tokio::test]
async fn test_required_failure_halts_chain() {
    let b_calls = Counter::new();
    let chain = ValidationChain::with_engine("halt", test_engine())
        .add_validation(always_fails("A", Counter::new()))
        .add_validation(always_passes("B", b_calls.clone()));

    let result = chain.execute(Context::new()).await;

    assert!(!result.success);
    assert_eq!(result.completed_steps, 0);
    assert_eq!(result.total_steps, 2);
    assert_eq!(result.results.len(), 1);
    assert!(!result.results[0].success);
    assert!(result.results[0].requires_manual_intervention);
    assert_eq!(b_calls.get(), 0);
}

#[tokio::test]
async fn test_optional_failure_does_not_block() {
    let chain = ValidationChain::with_engine("optional", test_engine())
        .add_validation(always_fails("A", Counter::new()).optional())
        .add_validation(always_passes("B", Counter::new()));

    let result = chain.execute(Context::new()).await;

    assert!(result.success);
    assert_eq!(result.completed_steps, 2);
    assert!(!result.results[0].success);
    assert!(result.results[1].success);
    assert_eq!(result.failed_steps().count(), 1);
}

#[tokio::test]
async fn test_context_threads_between_steps() {
    let chain = ValidationChain::with_engine("threading", test_engine())
        .add_validation(ValidationStep::new("write x", |_ctx| async {
            Ok(ValidationOutcome::passed_with(Context::new().with("x", 1)))
        }))
        .add_validation(ValidationStep::new("read x, write y", |ctx: Context| async move {
            if ctx.get_u64("x") != Some(1) {
                return Err(Failure::new("x was not threaded"));
            }
            Ok(ValidationOutcome::passed_with(Context::new().with("y", 2)))
        }));

    let result = chain.execute(Context::new().with("initial", true)).await;

    assert!(result.success);
    assert_eq!(
        result.context,
        Context::new().with("initial", true).with("x", 1).with("y", 2)
    );
}

#[tokio::test]
async fn test_failed_step_recovers_through_engine() {
    let calls = Counter::new();
    let seen = calls.clone();
    let chain = ValidationChain::with_engine("recovering", test_engine()).add_validation(
        ValidationStep::new("endpoint reachable", move |ctx: Context| {
            let seen = seen.clone();
            async move {
                seen.bump();
                Ok(if ctx.contains_key(keys::CURRENT_ENDPOINT) {
                    ValidationOutcome::passed()
                } else {
                    ValidationOutcome::failed("RPC provider unreachable")
                })
            }
        }),
    );

    let result = chain.execute(Context::new()).await;

    assert!(result.success);
    assert!(result.results[0].recovered);
    assert_eq!(result.results[0].attempts, 1);
    assert_eq!(
        result.context.get_str(keys::CURRENT_ENDPOINT),
        Some("https://cloudflare-eth.com")
    );
    // Initial check plus the confirming re-run
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_custom_recovery_replaces_engine() {
    let engine = test_engine();
    let chain = ValidationChain::with_engine("custom", Arc::clone(&engine)).add_validation(
        always_fails("patched", Counter::new()).with_recovery(|failure: Failure, context: Context| async move {
            assert_eq!(failure.message(), "something odd");
            RecoveryResult::custom(true, 1, context.with("patched", true))
        }),
    );

    let result = chain.execute(Context::new()).await;

    assert!(result.success);
    assert!(result.results[0].recovered);
    assert_eq!(result.context.get_bool("patched"), Some(true));
    assert!(engine.recovery_log().is_empty());
}

#[tokio::test]
async fn test_callbacks_fire() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let on_ok = Arc::clone(&events);
    let on_err = Arc::clone(&events);

    let chain = ValidationChain::with_engine("callbacks", test_engine())
        .add_validation(
            always_passes("good", Counter::new())
                .on_success(move |_ctx| on_ok.lock().unwrap().push("good ok".to_string())),
        )
        .add_validation(
            always_fails("bad", Counter::new())
                .optional()
                .on_failure(move |_ctx, failure| {
                    on_err.lock().unwrap().push(format!("bad failed: {}", failure))
                }),
        );

    chain.execute(Context::new()).await;

    assert_eq!(
        *events.lock().unwrap(),
        vec!["good ok".to_string(), "bad failed: something odd".to_string()]
    );
}

#[tokio::test]
async fn test_each_execution_starts_fresh() {
    let engine = engine_with(registry_of(
        FailureCategory::GenericError,
        &["first", "second", "third"],
        &Counter::new(),
    ));
    let calls = Counter::new();
    let seen = calls.clone();
    // Fails the first check of every execution
    let chain = ValidationChain::with_engine("repeat", engine).add_validation(ValidationStep::new(
        "flaky",
        move |_ctx: Context| {
            let seen = seen.clone();
            async move {
                Ok(if seen.bump() % 2 == 0 {
                    ValidationOutcome::failed("something odd")
                } else {
                    ValidationOutcome::passed()
                })
            }
        },
    ));

    for _ in 0..3 {
        let result = chain.execute(Context::new()).await;
        assert!(result.success);
        assert_eq!(result.results[0].attempts, 1);
    }
    assert_eq!(calls.get(), 6);
}

#[tokio::test]
async fn test_script_runs_end_to_end() {
    let script = ChainScript::from_json(
        r#"{
            "name": "Wallet Creation",
            "context": {"address": "0xabc"},
            "steps": [
                {"name": "Validate Address Format", "fail_times": 1, "error": "something odd", "writes": {"format_ok": true}},
                {"name": "Check Duplicates", "expects": {"format_ok": true}, "writes": {"unique": true}},
                {"name": "Fetch Balance", "required": false, "fail_times": 10, "error": "something odd"}
            ]
        }"#,
    )
    .unwrap();

    let result = script
        .build(test_engine())
        .execute(script.context.clone())
        .await;

    assert!(result.success);
    assert_eq!(result.chain_name, "Wallet Creation");
    assert_eq!(result.completed_steps, 3);
    assert!(result.results[0].recovered);
    assert!(result.results[1].success && !result.results[1].recovered);
    assert!(!result.results[2].success);
    assert_eq!(result.context.get_bool("format_ok"), Some(true));
    assert_eq!(result.context.get_bool("unique"), Some(true));
    assert_eq!(result.context.get_str("address"), Some("0xabc"));
}

#[tokio::test]
async fn test_script_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.json");
    std::fs::write(&path, r#"{"name": "file", "steps": [{"name": "only"}]}"#).unwrap();

    let script = ChainScript::load(&path).unwrap();
    let result = script.build(test_engine()).execute(Context::new()).await;

    assert!(result.success);
    assert_eq!(result.total_steps, 1);
}
