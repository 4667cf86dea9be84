//! Regression coverage for this module.

use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use serde_json::Map;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::envelope::{Envelope, EnvelopeDraft, ProjectId, SignerEmail};
use crate::domain::payment::GatewayEventKind;
use crate::domain::ports::{
    MockEnvelopeRepository, MockNotifier, MockProcessedEventStore, ReconciliationMetricsError,
};
use crate::test_support::MutableClock;

const NOW_MS: i64 = 1_700_000_000_000;

#[derive(Default)]
struct RecordingMetrics(Mutex<Vec<&'static str>>);

#[async_trait]
impl ReconciliationMetrics for RecordingMetrics {
    async fn record(
        &self,
        outcome: &ReconciliationOutcome,
    ) -> Result<(), ReconciliationMetricsError> {
        if let Ok(mut labels) = self.0.lock() {
            labels.push(outcome.label());
        }
        Ok(())
    }
}

struct Mocks {
    envelopes: MockEnvelopeRepository,
    processed: MockProcessedEventStore,
    notifier: MockNotifier,
    metrics: Arc<RecordingMetrics>,
}

#[fixture]
fn mocks() -> Mocks {
    Mocks {
        envelopes: MockEnvelopeRepository::new(),
        processed: MockProcessedEventStore::new(),
        notifier: MockNotifier::new(),
        metrics: Arc::new(RecordingMetrics::default()),
    }
}

fn build(mocks: Mocks) -> (PaymentReconciliationService, Arc<RecordingMetrics>) {
    let metrics = Arc::clone(&mocks.metrics);
    let service = PaymentReconciliationService::new(
        PaymentPorts {
            envelopes: Arc::new(mocks.envelopes),
            processed_events: Arc::new(mocks.processed),
            notifier: Arc::new(mocks.notifier),
            metrics: mocks.metrics,
        },
        Arc::new(MutableClock::at_millis(NOW_MS)),
        ReconciliationConfig::default(),
    );
    (service, metrics)
}

fn envelope() -> Envelope {
    let draft = EnvelopeDraft {
        doc_type: "legacy-msa".to_owned(),
        project: ProjectId::Sirsi,
        signers: vec![SignerEmail::parse("a@x.com").expect("email")],
        metadata: Map::new(),
        guest: true,
        callback_url: None,
    };
    Envelope::create(
        EnvelopeId::random(),
        draft,
        MutableClock::at_millis(NOW_MS).utc(),
    )
    .expect("envelope")
}

fn with_payment(status: PaymentStatus) -> Envelope {
    let mut envelope = envelope();
    envelope.apply_payment(status, MutableClock::at_millis(NOW_MS).utc());
    envelope
}

fn event(kind: GatewayEventKind, envelope: &Envelope) -> GatewayEvent {
    GatewayEvent {
        id: "evt_1".to_owned(),
        kind,
        correlation_id: Some(envelope.id().to_string()),
        customer_email: Some("ada@example.com".to_owned()),
        customer_name: None,
    }
}

fn stored(envelope: &Envelope) -> Result<Envelope, EnvelopeRepositoryError> {
    let mut next = envelope.clone();
    next.set_version(envelope.version() + 1);
    Ok(next)
}

fn labels(metrics: &RecordingMetrics) -> Vec<&'static str> {
    metrics.0.lock().map(|labels| labels.clone()).unwrap_or_default()
}

#[rstest]
#[tokio::test]
async fn settled_checkout_pays_and_provisions_once(mut mocks: Mocks) {
    let current = envelope();
    let id = current.id();
    let incoming = event(GatewayEventKind::CheckoutCompleted { settled: true }, &current);
    mocks
        .processed
        .expect_claim()
        .withf(|event_id, ttl| event_id == "evt_1" && *ttl == TimeDelta::days(7))
        .times(1)
        .returning(|_, _| Ok(true));
    mocks
        .envelopes
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .envelopes
        .expect_update_if_unchanged()
        .withf(|envelope| {
            envelope.payment_status() == Some(PaymentStatus::Paid)
                && envelope.provisioned_at().is_some()
        })
        .times(1)
        .returning(stored);
    mocks
        .notifier
        .expect_send_provisioning()
        .withf(move |notice| {
            notice.email == "ada@example.com"
                && notice.name == "Client"
                && notice.reference == id.to_string()
        })
        .times(1)
        .returning(|_| Ok(()));

    let (service, metrics) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert_eq!(
        outcome,
        ReconciliationOutcome::Applied {
            envelope_id: id,
            from: None,
            to: PaymentStatus::Paid,
            provisioned: true,
        }
    );
    assert_eq!(labels(&metrics), ["applied"]);
}

#[rstest]
#[tokio::test]
async fn duplicate_event_is_acknowledged_without_writes(mut mocks: Mocks) {
    let current = envelope();
    let incoming = event(GatewayEventKind::CheckoutCompleted { settled: true }, &current);
    mocks.processed.expect_claim().returning(|_, _| Ok(false));
    mocks.envelopes.expect_find_by_id().never();
    mocks.notifier.expect_send_provisioning().never();

    let (service, metrics) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert_eq!(outcome, ReconciliationOutcome::Duplicate);
    assert_eq!(labels(&metrics), ["duplicate"]);
}

#[rstest]
#[case(PaymentStatus::Paid, GatewayEventKind::CheckoutCompleted { settled: false })]
#[case(PaymentStatus::Paid, GatewayEventKind::AsyncPaymentFailed)]
#[case(PaymentStatus::Paid, GatewayEventKind::AsyncPaymentSucceeded)]
#[case(PaymentStatus::PaymentFailed, GatewayEventKind::CheckoutCompleted { settled: false })]
#[tokio::test]
async fn late_events_never_move_status_backwards(
    mut mocks: Mocks,
    #[case] current_status: PaymentStatus,
    #[case] kind: GatewayEventKind,
) {
    let current = with_payment(current_status);
    let incoming = event(kind, &current);
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks
        .envelopes
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks.envelopes.expect_update_if_unchanged().never();
    mocks.notifier.expect_send_provisioning().never();

    let (service, _) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert!(matches!(
        outcome,
        ReconciliationOutcome::Unchanged { current: Some(status), .. } if status == current_status
    ));
}

#[rstest]
#[tokio::test]
async fn failed_settlement_can_still_be_paid(mut mocks: Mocks) {
    let current = with_payment(PaymentStatus::PaymentFailed);
    let incoming = event(GatewayEventKind::AsyncPaymentSucceeded, &current);
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks
        .envelopes
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .envelopes
        .expect_update_if_unchanged()
        .returning(stored);
    mocks
        .notifier
        .expect_send_provisioning()
        .times(1)
        .returning(|_| Ok(()));

    let (service, _) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert!(matches!(
        outcome,
        ReconciliationOutcome::Applied {
            from: Some(PaymentStatus::PaymentFailed),
            to: PaymentStatus::Paid,
            provisioned: true,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn pending_checkout_waits_without_provisioning(mut mocks: Mocks) {
    let current = envelope();
    let incoming = event(GatewayEventKind::CheckoutCompleted { settled: false }, &current);
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks
        .envelopes
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .envelopes
        .expect_update_if_unchanged()
        .returning(stored);
    mocks.notifier.expect_send_provisioning().never();

    let (service, _) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert!(matches!(
        outcome,
        ReconciliationOutcome::Applied {
            to: PaymentStatus::WaitingForPayment,
            provisioned: false,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn unknown_event_types_are_ignored(mut mocks: Mocks) {
    let current = envelope();
    let incoming = event(
        GatewayEventKind::Unknown {
            event_type: "invoice.created".to_owned(),
        },
        &current,
    );
    mocks.processed.expect_claim().never();

    let (service, metrics) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert_eq!(
        outcome,
        ReconciliationOutcome::Ignored {
            event_type: "invoice.created".to_owned()
        }
    );
    assert_eq!(labels(&metrics), ["ignored"]);
}

#[rstest]
#[case(None, ReconciliationOutcome::MissingCorrelation)]
#[case(Some("not-a-uuid"), ReconciliationOutcome::UnknownEnvelope)]
#[tokio::test]
async fn unresolvable_correlation_is_acknowledged(
    mut mocks: Mocks,
    #[case] correlation: Option<&str>,
    #[case] expected: ReconciliationOutcome,
) {
    mocks.processed.expect_claim().never();
    let mut incoming = event(GatewayEventKind::AsyncPaymentSucceeded, &envelope());
    incoming.correlation_id = correlation.map(str::to_owned);

    let (service, _) = build(mocks);
    assert_eq!(service.handle_event(incoming).await.expect("handled"), expected);
}

#[rstest]
#[tokio::test]
async fn missing_envelope_is_acknowledged(mut mocks: Mocks) {
    let incoming = event(GatewayEventKind::AsyncPaymentSucceeded, &envelope());
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks.processed.expect_release().never();
    mocks.envelopes.expect_find_by_id().returning(|_| Ok(None));

    let (service, _) = build(mocks);
    assert_eq!(
        service.handle_event(incoming).await.expect("handled"),
        ReconciliationOutcome::UnknownEnvelope
    );
}

#[rstest]
#[tokio::test]
async fn upstream_failure_releases_the_claim(mut mocks: Mocks) {
    let incoming = event(GatewayEventKind::AsyncPaymentSucceeded, &envelope());
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks
        .processed
        .expect_release()
        .withf(|event_id| event_id == "evt_1")
        .times(1)
        .returning(|_| Ok(()));
    mocks
        .envelopes
        .expect_find_by_id()
        .returning(|_| Err(EnvelopeRepositoryError::connection("refused")));

    let (service, metrics) = build(mocks);
    let error = service.handle_event(incoming).await.expect_err("retryable");
    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    assert!(labels(&metrics).is_empty());
}

#[rstest]
#[tokio::test]
async fn lost_race_rereads_before_applying(mut mocks: Mocks) {
    let current = envelope();
    let incoming = event(GatewayEventKind::AsyncPaymentSucceeded, &current);
    mocks.processed.expect_claim().returning(|_, _| Ok(true));
    mocks
        .envelopes
        .expect_find_by_id()
        .times(2)
        .returning(move |_| Ok(Some(current.clone())));
    let mut calls = 0;
    mocks
        .envelopes
        .expect_update_if_unchanged()
        .times(2)
        .returning(move |envelope| {
            calls += 1;
            if calls == 1 {
                Err(EnvelopeRepositoryError::version_conflict(
                    envelope.id().to_string(),
                ))
            } else {
                stored(envelope)
            }
        });
    mocks
        .notifier
        .expect_send_provisioning()
        .times(1)
        .returning(|_| Ok(()));

    let (service, _) = build(mocks);
    let outcome = service.handle_event(incoming).await.expect("handled");
    assert_eq!(outcome.label(), "applied");
}
