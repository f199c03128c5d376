//! Integration tests for retry scheduling, backoff, and the worker loop.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p worklane-webhooks --features integration`

#![cfg(feature = "integration")]

mod common;

use std::time::Duration;

use common::*;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use worklane_db::models::{DeliveryStatus, WebhookDelivery};
use worklane_webhooks::{DispatchOutcome, WebhookWorker, WorkerConfig};

/// A 5xx response schedules a retry with the initial backoff delay and
/// moves the row to `retrying`.
#[tokio::test]
async fn test_server_error_schedules_retry() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let outcome = ctx
        .delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::RetryScheduled {
            attempt_count: 1,
            delay_seconds: 60
        }
    );

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.status(), DeliveryStatus::Retrying);
    assert_eq!(fresh.attempt_count, 1);
    assert_eq!(fresh.response_status_code, Some(500));
    assert_eq!(fresh.response_body.as_deref(), Some("boom"));
    assert_eq!(fresh.error_message.as_deref(), Some("HTTP 500"));
    assert!(fresh.completed_at.is_none());

    let next_retry_at = fresh.next_retry_at.expect("a retry must be scheduled");
    let wait = next_retry_at - chrono::Utc::now();
    assert!(wait.num_seconds() > 55 && wait.num_seconds() <= 60);
}

/// A scheduled retry that is not yet due is left alone.
#[tokio::test]
async fn test_retry_not_due_is_skipped() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let counter = CountingResponder::with_status(500);

    Mock::given(method("POST"))
        .respond_with(counter.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let service = ctx.delivery_service();
    service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(counter.count(), 1);

    // The retry is ~60s out; an early re-dispatch must not hit the endpoint
    let outcome = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Skipped {
            reason: "retry not due"
        }
    );
    assert_eq!(counter.count(), 1);
    assert_eq!(ctx.reload(delivery.id).await.attempt_count, 1);
}

/// The backoff delay doubles with each failed attempt: 60, 120, 240.
#[tokio::test]
async fn test_backoff_delay_doubles_per_attempt() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let service = ctx.delivery_service();
    for (expected_attempt, expected_delay) in [(1, 60), (2, 120), (3, 240)] {
        let outcome = service.dispatch_delivery(delivery.id).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::RetryScheduled {
                attempt_count: expected_attempt,
                delay_seconds: expected_delay
            }
        );
        ctx.make_retry_due(delivery.id).await;
    }
}

/// An endpoint that always fails exhausts the attempt budget: the delivery
/// ends `failed` at exactly `max_attempts` attempts and the endpoint is
/// hit exactly that many times.
#[tokio::test]
async fn test_always_failing_endpoint_exhausts_budget() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let counter = CountingResponder::with_status(500);

    Mock::given(method("POST"))
        .respond_with(counter.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 3).await;

    let service = ctx.immediate_retry_service();

    let first = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        first,
        DispatchOutcome::RetryScheduled {
            attempt_count: 1,
            delay_seconds: 0
        }
    );

    let second = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        second,
        DispatchOutcome::RetryScheduled {
            attempt_count: 2,
            delay_seconds: 0
        }
    );

    // Third attempt is the last one the budget allows
    let third = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        third,
        DispatchOutcome::Failed {
            reason: "HTTP 500".to_string()
        }
    );

    assert_eq!(counter.count(), 3);

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.status(), DeliveryStatus::Failed);
    assert_eq!(fresh.attempt_count, 3);
    assert!(fresh.completed_at.is_some());
    assert!(fresh.next_retry_at.is_none());

    // A terminal row stays terminal
    let again = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        again,
        DispatchOutcome::Skipped {
            reason: "already terminal"
        }
    );
    assert_eq!(counter.count(), 3);
}

/// An endpoint that recovers after transient failures ends in `success`
/// with the full attempt history counted.
#[tokio::test]
async fn test_recovery_after_transient_failures() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let responder = FailingResponder::fail_times(2);

    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let service = ctx.immediate_retry_service();
    service.dispatch_delivery(delivery.id).await.unwrap();
    service.dispatch_delivery(delivery.id).await.unwrap();

    let outcome = service.dispatch_delivery(delivery.id).await.unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Succeeded {
            attempt_count: 3,
            status_code: 200
        }
    );
    assert_eq!(responder.attempt_count(), 3);

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.status(), DeliveryStatus::Success);
    assert_eq!(fresh.attempt_count, 3);
    // The stored response reflects the final, successful attempt
    assert_eq!(fresh.response_status_code, Some(200));
}

/// A successful retry clears the error context timestamp-wise: the row is
/// terminal and no further retry is pending.
#[tokio::test]
async fn test_success_after_retry_clears_schedule() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let responder = FailingResponder::fail_times(1);

    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let service = ctx.immediate_retry_service();
    service.dispatch_delivery(delivery.id).await.unwrap();
    assert!(ctx.reload(delivery.id).await.next_retry_at.is_some());

    service.dispatch_delivery(delivery.id).await.unwrap();

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.status(), DeliveryStatus::Success);
    assert!(fresh.next_retry_at.is_none());
    assert!(fresh.completed_at.is_some());
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 4,
        retry_sweep_interval_secs: 1,
        cleanup_interval_secs: 3600,
        retention_days: 30,
        sweep_batch_size: 100,
    }
}

/// The worker consumes queued delivery ids and executes them.
#[tokio::test]
async fn test_worker_consumes_dispatch_queue() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let (queue, receiver) = ctx.dispatch_queue();
    let token = CancellationToken::new();
    let worker = WebhookWorker::new(ctx.delivery_service(), receiver, token.clone())
        .with_config(fast_worker_config());
    let handle = tokio::spawn(worker.run());

    assert!(queue.enqueue(delivery.id));

    // Give the worker time to pick it up and complete the HTTP round trip
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if ctx.reload(delivery.id).await.status() == DeliveryStatus::Success {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker did not complete the delivery in time"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    token.cancel();
    handle.await.unwrap();

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.attempt_count, 1);
}

/// The retry sweep picks up a due `retrying` delivery without anyone
/// re-enqueueing it.
#[tokio::test]
async fn test_worker_sweep_redispatches_due_retries() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let responder = FailingResponder::fail_times(1);

    Mock::given(method("POST"))
        .respond_with(responder.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    // First attempt fails and schedules a retry; backdate it to due
    ctx.delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();
    assert_eq!(ctx.reload(delivery.id).await.status(), DeliveryStatus::Retrying);
    ctx.make_retry_due(delivery.id).await;

    let (_queue, receiver) = ctx.dispatch_queue();
    let token = CancellationToken::new();
    let worker = WebhookWorker::new(ctx.delivery_service(), receiver, token.clone())
        .with_config(fast_worker_config());
    let handle = tokio::spawn(worker.run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if ctx.reload(delivery.id).await.status() == DeliveryStatus::Success {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "sweep did not redispatch the due retry in time"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    token.cancel();
    handle.await.unwrap();

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.attempt_count, 2);
    assert_eq!(responder.attempt_count(), 2);
}

/// The sweep only picks up rows that are actually due.
#[tokio::test]
async fn test_pending_retries_respects_due_time() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let due = ctx.create_delivery(webhook.id, sample_payload(), 5).await;
    let not_due = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let service = ctx.delivery_service();
    service.dispatch_delivery(due.id).await.unwrap();
    service.dispatch_delivery(not_due.id).await.unwrap();
    ctx.make_retry_due(due.id).await;

    let rows = WebhookDelivery::pending_retries(ctx.pool.inner(), 100)
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|d| d.id).collect();
    assert!(ids.contains(&due.id));
    assert!(!ids.contains(&not_due.id));
}
