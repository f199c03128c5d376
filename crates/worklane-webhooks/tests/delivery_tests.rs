//! Integration tests for successful webhook delivery and the wire contract.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p worklane-webhooks --features integration`

#![cfg(feature = "integration")]

mod common;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use worklane_db::models::{DeliveryStatus, WebhookDelivery, WebhookEventSubscription};
use worklane_webhooks::services::delivery_service::USER_AGENT;
use worklane_webhooks::signature;
use worklane_webhooks::{DispatchOutcome, TriggerService};

/// First-attempt success: delivery reaches `success` with one counted
/// attempt, a completion timestamp, and no retry scheduled.
#[tokio::test]
async fn test_first_attempt_success() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&format!("{}/hook", mock_server.uri())).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    let outcome = ctx
        .delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome::Succeeded {
            attempt_count: 1,
            status_code: 200
        }
    );

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.status(), DeliveryStatus::Success);
    assert_eq!(fresh.attempt_count, 1);
    assert_eq!(fresh.response_status_code, Some(200));
    assert_eq!(fresh.response_body.as_deref(), Some("{\"ok\":true}"));
    assert!(fresh.sent_at.is_some());
    assert!(fresh.completed_at.is_some());
    assert!(fresh.next_retry_at.is_none());
}

/// The outgoing request carries the full wire contract: POST, JSON content
/// type, product user agent, and a signature verifiable over the exact
/// body bytes.
#[tokio::test]
async fn test_wire_contract_headers_and_signature() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx.create_webhook(&format!("{}/hook", mock_server.uri())).await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    ctx.delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    assert_eq!(capture.request_count(), 1);
    let captured = &capture.requests()[0];

    assert!(captured
        .header("content-type")
        .unwrap()
        .contains("application/json"));
    assert_eq!(captured.header("user-agent"), Some(USER_AGENT));

    // Receiver-side verification over the raw body bytes
    assert!(verify_captured_signature(captured, &webhook.secret));
    assert!(
        !verify_captured_signature(captured, "whsec_wrong"),
        "a different secret must not verify"
    );
}

/// The POSTed body is the canonical JSON form (sorted keys, compact), so
/// the signed bytes and the wire bytes are identical.
#[tokio::test]
async fn test_body_is_canonical_payload() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let payload = serde_json::json!({"zeta": 1, "alpha": {"y": true, "x": false}});
    let webhook = ctx.create_webhook(&mock_server.uri()).await;
    let delivery = ctx.create_delivery(webhook.id, payload.clone(), 5).await;

    ctx.delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    let captured = &capture.requests()[0];
    assert_eq!(captured.body, signature::canonical_bytes(&payload).unwrap());
    // Not wrapped in an envelope: the body parses back to the payload itself
    assert_eq!(captured.body_json(), payload);
}

/// Custom webhook headers ride along but can never shadow the
/// dispatcher-owned content-type and signature headers.
#[tokio::test]
async fn test_custom_headers_merged_without_override() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let webhook = ctx
        .create_webhook_with(
            &mock_server.uri(),
            serde_json::json!({
                "X-Api-Key": "k-123",
                "Content-Type": "text/plain",
                "X-Webhook-Signature": "sha256=forged"
            }),
            30,
        )
        .await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    ctx.delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    let captured = &capture.requests()[0];
    assert_eq!(captured.header("x-api-key"), Some("k-123"));
    assert!(captured
        .header("content-type")
        .unwrap()
        .contains("application/json"));
    // The real signature won, not the forged one
    assert!(verify_captured_signature(captured, &webhook.secret));
}

/// Every 2xx response code counts as success.
#[tokio::test]
async fn test_all_2xx_codes_are_success() {
    let ctx = TestContext::new().await;

    for status_code in [200u16, 201, 204] {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(status_code))
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
            DispatchOutcome::Succeeded {
                attempt_count: 1,
                status_code
            },
            "HTTP {status_code} should complete the delivery"
        );
    }
}

/// The exact outgoing URL and headers are persisted for audit before the
/// attempt goes out.
#[tokio::test]
async fn test_request_audit_trail_persisted() {
    let ctx = TestContext::new().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let webhook = ctx
        .create_webhook_with(&mock_server.uri(), serde_json::json!({"X-Trace": "t-9"}), 30)
        .await;
    let delivery = ctx.create_delivery(webhook.id, sample_payload(), 5).await;

    ctx.delivery_service()
        .dispatch_delivery(delivery.id)
        .await
        .unwrap();

    let fresh = ctx.reload(delivery.id).await;
    assert_eq!(fresh.request_url.as_deref(), Some(webhook.url.as_str()));

    let headers = fresh.request_headers.expect("request headers should be recorded");
    assert_eq!(headers["x-trace"], "t-9");
    assert!(headers["x-webhook-signature"]
        .as_str()
        .unwrap()
        .starts_with("sha256="));
}

// ---------------------------------------------------------------------------
// Trigger fan-out
// ---------------------------------------------------------------------------

/// Fan-out creates exactly one delivery per active subscriber, skipping
/// inactive subscriptions, inactive webhooks, and other event types.
#[tokio::test]
async fn test_trigger_fans_out_to_active_subscribers_only() {
    let ctx = TestContext::new().await;
    let event_type = format!("order.completed.{}", uuid::Uuid::new_v4().simple());

    let sub_a = ctx.create_webhook("https://hooks.example.com/a").await;
    let sub_b = ctx.create_webhook("https://hooks.example.com/b").await;
    WebhookEventSubscription::subscribe(ctx.pool.inner(), sub_a.id, &event_type)
        .await
        .unwrap();
    WebhookEventSubscription::subscribe(ctx.pool.inner(), sub_b.id, &event_type)
        .await
        .unwrap();

    // Paused subscription, disabled webhook, unrelated event type
    let paused = ctx.create_webhook("https://hooks.example.com/paused").await;
    WebhookEventSubscription::subscribe(ctx.pool.inner(), paused.id, &event_type)
        .await
        .unwrap();
    WebhookEventSubscription::set_active(ctx.pool.inner(), paused.id, &event_type, false)
        .await
        .unwrap();

    let disabled = ctx
        .create_inactive_webhook("https://hooks.example.com/disabled")
        .await;
    WebhookEventSubscription::subscribe(ctx.pool.inner(), disabled.id, &event_type)
        .await
        .unwrap();

    let other = ctx.create_webhook("https://hooks.example.com/other").await;
    WebhookEventSubscription::subscribe(ctx.pool.inner(), other.id, "user.deleted")
        .await
        .unwrap();

    let (queue, mut receiver) = ctx.dispatch_queue();
    let trigger = TriggerService::new(ctx.pool.inner().clone(), queue);

    let result = trigger
        .trigger(&event_type, sample_payload(), Some("evt-42".to_string()))
        .await
        .unwrap();

    assert_eq!(result.delivery_ids.len(), 2);
    assert_eq!(result.event_id, "evt-42");

    // Each created delivery is pending and was handed to the queue
    let mut queued = Vec::new();
    while let Ok(id) = receiver.try_recv() {
        queued.push(id);
    }
    assert_eq!(queued.len(), 2);

    for id in &result.delivery_ids {
        assert!(queued.contains(id));
        let row = ctx.reload(*id).await;
        assert_eq!(row.status(), DeliveryStatus::Pending);
        assert_eq!(row.event_type, event_type);
        assert!([sub_a.id, sub_b.id].contains(&row.webhook_id));
    }
}

/// An event with no subscribers is a no-op: zero deliveries, no rows.
#[tokio::test]
async fn test_trigger_with_no_subscribers_is_noop() {
    let ctx = TestContext::new().await;
    let event_type = format!("nobody.listens.{}", uuid::Uuid::new_v4().simple());

    let (queue, mut receiver) = ctx.dispatch_queue();
    let trigger = TriggerService::new(ctx.pool.inner().clone(), queue);

    let result = trigger
        .trigger(&event_type, sample_payload(), None)
        .await
        .unwrap();

    assert!(result.delivery_ids.is_empty());
    assert!(receiver.try_recv().is_err(), "nothing should be enqueued");

    let filter = worklane_db::models::DeliveryFilter::default();
    let rows = WebhookDelivery::list(ctx.pool.inner(), &filter, 1000, 0)
        .await
        .unwrap();
    assert!(
        !rows.iter().any(|d| d.event_type == event_type),
        "no delivery rows may exist for the event"
    );
}

/// A generated event id is attached when the caller omits one.
#[tokio::test]
async fn test_trigger_generates_event_id_when_missing() {
    let ctx = TestContext::new().await;
    let event_type = format!("task.created.{}", uuid::Uuid::new_v4().simple());

    let webhook = ctx.create_webhook("https://hooks.example.com/t").await;
    WebhookEventSubscription::subscribe(ctx.pool.inner(), webhook.id, &event_type)
        .await
        .unwrap();

    let (queue, _receiver) = ctx.dispatch_queue();
    let trigger = TriggerService::new(ctx.pool.inner().clone(), queue);

    let result = trigger
        .trigger(&event_type, sample_payload(), None)
        .await
        .unwrap();

    assert!(!result.event_id.is_empty());
    let row = ctx.reload(result.delivery_ids[0]).await;
    assert_eq!(row.event_id.as_deref(), Some(result.event_id.as_str()));
}
