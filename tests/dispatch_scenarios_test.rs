mod common;

use bulkpay::application::dispatcher::DispatcherConfig;
use bulkpay::domain::instruction::Batch;
use bulkpay::domain::outcome::{BatchState, OutcomeStatus};
use bulkpay::error::DispatchError;
use bulkpay::infrastructure::scripted_channel::ScriptedChannel;
use common::{batch001, harness, harness_with, instruction};
use rand::Rng;
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn test_batch_with_succeeding_downstream() {
    let h = harness(ScriptedChannel::new(), 3);

    let result = h.dispatcher.submit(batch001()).await.unwrap();

    assert_eq!(result.batch_id, "BATCH001");
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].instruction_id(), "TX001");
    assert_eq!(result.outcomes[0].status(), OutcomeStatus::Success);
    assert_eq!(result.outcomes[1].instruction_id(), "TX002");
    assert_eq!(result.outcomes[1].status(), OutcomeStatus::Success);
    assert_eq!(h.metrics.successes(), 2);
    assert_eq!(h.metrics.failures(), 0);
}

#[tokio::test]
async fn test_batch_with_failing_downstream() {
    let h = harness(ScriptedChannel::failing("Connection refused"), 3);

    let result = h.dispatcher.submit(batch001()).await.unwrap();

    assert_eq!(result.outcomes.len(), 2);
    for outcome in &result.outcomes {
        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert!(!outcome.reason().unwrap().is_empty());
    }
    assert_eq!(h.metrics.successes(), 0);
    assert_eq!(h.metrics.failures(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_calls_downstream_max_attempts_times() {
    let h = harness(ScriptedChannel::failing("Service unavailable"), 4);

    let result = h.dispatcher.submit(batch001()).await.unwrap();

    assert!(
        result.outcomes[0]
            .reason()
            .unwrap()
            .contains("All retry attempts failed")
    );
    assert_eq!(h.channel.calls_for("TX001"), 4);
    assert_eq!(h.channel.calls_for("TX002"), 4);
}

#[tokio::test]
async fn test_resubmission_never_reaches_downstream() {
    let h = harness(ScriptedChannel::new(), 3);

    let first = h.dispatcher.submit(batch001()).await.unwrap();
    let second = h.dispatcher.submit(batch001()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.channel.calls_for("TX001"), 1);
    assert_eq!(h.channel.calls_for("TX002"), 1);
    assert_eq!(h.metrics.successes(), 2);
}

#[tokio::test]
async fn test_concurrent_resubmissions_execute_once() {
    let h = harness(ScriptedChannel::new().gated(), 3);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = h.dispatcher.clone();
        handles.push(tokio::spawn(async move { dispatcher.submit(batch001()).await }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        h.dispatcher.batch_state("BATCH001").await.unwrap(),
        BatchState::InFlight
    );
    assert!(matches!(
        h.dispatcher.get_batch_results("BATCH001").await,
        Err(DispatchError::BatchNotFound(_))
    ));
    h.channel.open_gate();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert!(results.iter().all(|r| r == &results[0]));
    assert_eq!(results[0].outcomes.len(), 2);
    assert_eq!(h.channel.call_count(), 2);
    assert_eq!(
        h.dispatcher.batch_state("BATCH001").await.unwrap(),
        BatchState::Complete
    );
}

#[tokio::test]
async fn test_rejected_instruction_does_not_affect_siblings() {
    let channel = ScriptedChannel::new();
    channel.reject_transaction("TX002");
    let h = harness(channel, 2);
    let batch = Batch::new(
        "BATCH-ISO",
        vec![
            instruction("TX001", dec!(1)),
            instruction("TX002", dec!(2)),
            instruction("TX003", dec!(3)),
        ],
    )
    .unwrap();

    let result = h.dispatcher.submit(batch).await.unwrap();

    assert!(result.outcomes[0].is_success());
    assert_eq!(result.outcomes[1].status(), OutcomeStatus::Failed);
    assert!(
        result.outcomes[1]
            .reason()
            .unwrap()
            .contains("status 422")
    );
    assert!(result.outcomes[2].is_success());
    assert_eq!(h.metrics.successes(), 2);
    assert_eq!(h.metrics.failures(), 1);
}

#[tokio::test]
async fn test_unknown_batch_lookup() {
    let h = harness(ScriptedChannel::new(), 3);

    let err = h
        .dispatcher
        .get_batch_results("NOT-SUBMITTED")
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::BatchNotFound(id) if id == "NOT-SUBMITTED"));
}

#[tokio::test]
async fn test_lookup_after_submission() {
    let h = harness(ScriptedChannel::new(), 3);
    let submitted = h.dispatcher.submit(batch001()).await.unwrap();

    let looked_up = h.dispatcher.get_batch_results("BATCH001").await.unwrap();

    assert_eq!(submitted, looked_up);
}

#[tokio::test]
async fn test_outcomes_follow_submission_order() {
    let mut rng = rand::thread_rng();

    for concurrency in [1, 3, 8] {
        let channel = ScriptedChannel::new();
        let size = rng.gen_range(1..40);
        let ids: Vec<String> = (0..size).map(|i| format!("TX{i:03}")).collect();
        for id in &ids {
            if rng.gen_bool(0.3) {
                channel.reject_transaction(id.clone());
            }
        }
        let config = DispatcherConfig {
            instruction_concurrency: concurrency,
            ..DispatcherConfig::default()
        };
        let h = harness_with(channel, 1, config);
        let batch = Batch::new(
            format!("BATCH-{concurrency}"),
            ids.iter().map(|id| instruction(id, dec!(9.99))).collect(),
        )
        .unwrap();

        let result = h.dispatcher.submit(batch).await.unwrap();

        assert_eq!(result.outcomes.len(), ids.len());
        for (outcome, id) in result.outcomes.iter().zip(&ids) {
            assert_eq!(outcome.instruction_id(), id);
        }
        assert_eq!(
            h.metrics.successes() + h.metrics.failures(),
            ids.len() as u64
        );
    }
}
