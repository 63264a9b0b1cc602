//! Connection loss, reconnect and startup behaviour of the driver.

use integration_tests::{
    fixtures,
    mocks::{Fault, MockConnector},
    setup::{connection_manager, instant_config, processor, TestContext, TEST_ATTEMPTS},
};
use telemetry::health;
use worker::{Pipeline, PipelineState, StepOutcome};

/// A store connection loss dead-letters the reading and rebuilds the handles.
#[tokio::test]
async fn test_store_connection_loss_triggers_reconnect() {
    let mut ctx = TestContext::new().await;
    assert_eq!(ctx.connector.connects(), 1);

    ctx.structured().fail_always(Fault::Connection);
    let raw = fixtures::payload(&fixtures::hot_reading());
    ctx.queue().push(raw.clone());

    let outcome = ctx.pipeline.step().await;
    assert_eq!(outcome, StepOutcome::DeadLettered { code: "RETRY_001" });
    assert_eq!(ctx.pipeline.state(), PipelineState::Reconnecting);
    assert_eq!(ctx.queue().dead_letters(), vec![raw]);
    assert!(!health().structured_store.is_healthy());

    ctx.structured().heal();
    assert_eq!(ctx.pipeline.step().await, StepOutcome::Reconnected);
    assert_eq!(ctx.pipeline.state(), PipelineState::Running);
    assert_eq!(ctx.connector.connects(), 2);

    ctx.queue().push(fixtures::payload(&fixtures::hot_reading()));
    assert_eq!(ctx.pipeline.step().await, StepOutcome::Processed { alerts: 1 });
}

/// A queue connection loss moves to reconnecting without dead-lettering.
#[tokio::test]
async fn test_queue_connection_loss_triggers_reconnect() {
    let mut ctx = TestContext::new().await;
    ctx.queue().push(fixtures::payload(&fixtures::hot_reading()));
    ctx.queue().fail_pops(1, Fault::Connection);

    assert_eq!(ctx.pipeline.step().await, StepOutcome::ConnectionLost);
    assert_eq!(ctx.pipeline.state(), PipelineState::Reconnecting);
    assert!(ctx.queue().dead_letters().is_empty());
    assert_eq!(ctx.queue().pending(), 1);

    assert_eq!(ctx.pipeline.step().await, StepOutcome::Reconnected);
    assert_eq!(ctx.pipeline.step().await, StepOutcome::Processed { alerts: 1 });
}

/// A queue error that is not a connection loss pauses and carries on.
#[tokio::test]
async fn test_transient_queue_error_keeps_running() {
    let mut ctx = TestContext::new().await;
    ctx.queue().fail_pops(1, Fault::Transient);

    assert_eq!(ctx.pipeline.step().await, StepOutcome::Idle);
    assert_eq!(ctx.pipeline.state(), PipelineState::Running);
    assert_eq!(ctx.connector.connects(), 1);
}

/// A failed reconnect leaves the driver reconnecting; it tries again.
#[tokio::test]
async fn test_failed_reconnect_is_retried() {
    let mut ctx = TestContext::new().await;
    ctx.queue().fail_pops(1, Fault::Connection);
    assert_eq!(ctx.pipeline.step().await, StepOutcome::ConnectionLost);

    // Enough failures to exhaust one full reconnect
    ctx.connector.fail_times(TEST_ATTEMPTS, Fault::Connection);
    assert_eq!(ctx.pipeline.step().await, StepOutcome::ReconnectFailed);
    assert_eq!(ctx.pipeline.state(), PipelineState::Reconnecting);
    assert!(!ctx.pipeline.connections().is_connected());
    assert_eq!(ctx.connector.connects(), 1 + TEST_ATTEMPTS);

    assert_eq!(ctx.pipeline.step().await, StepOutcome::Reconnected);
    assert_eq!(ctx.pipeline.state(), PipelineState::Running);
    assert!(ctx.pipeline.connections().is_connected());
}

/// A configuration error during reconnect halts the driver.
#[tokio::test]
async fn test_config_error_on_reconnect_is_fatal() {
    let mut ctx = TestContext::new().await;
    ctx.queue().fail_pops(1, Fault::Connection);
    assert_eq!(ctx.pipeline.step().await, StepOutcome::ConnectionLost);

    ctx.connector.fail_always(Fault::Config);
    assert_eq!(ctx.pipeline.step().await, StepOutcome::Halted);
    assert_eq!(ctx.pipeline.state(), PipelineState::Fatal);

    // Config errors are not retried
    assert_eq!(ctx.connector.connects(), 2);

    let err = ctx.pipeline.run().await.unwrap_err();
    assert_eq!(err.code(), "CONFIG_001");
}

/// Startup gives up after the connect policy's attempts.
#[tokio::test]
async fn test_startup_exhaustion_is_fatal() {
    let connector = MockConnector::new();
    connector.fail_always(Fault::Connection);

    let mut connections = connection_manager(&connector);
    let err = connections.connect().await.unwrap_err();

    assert_eq!(err.code(), "START_001");
    assert!(err.is_fatal());
    assert_eq!(connector.connects(), TEST_ATTEMPTS);
    assert!(!connections.is_connected());
}

/// Startup succeeds if the backends come up within the attempt budget.
#[tokio::test]
async fn test_startup_survives_slow_backends() {
    let connector = MockConnector::new();
    connector.fail_times(TEST_ATTEMPTS - 1, Fault::Connection);

    let mut connections = connection_manager(&connector);
    connections.connect().await.unwrap();

    assert!(connections.is_connected());
    assert_eq!(connector.connects(), TEST_ATTEMPTS);
}

/// A driver built without live handles reconnects before polling.
#[tokio::test]
async fn test_unconnected_pipeline_reconnects_first() {
    let connector = MockConnector::new();
    let mut pipeline = Pipeline::new(connection_manager(&connector), processor(), instant_config());
    connector.queue.push(fixtures::payload(&fixtures::hot_reading()));

    assert_eq!(pipeline.step().await, StepOutcome::ConnectionLost);
    assert_eq!(pipeline.step().await, StepOutcome::Reconnected);
    assert_eq!(pipeline.step().await, StepOutcome::Processed { alerts: 1 });
    assert_eq!(connector.structured.rows().len(), 1);
}
