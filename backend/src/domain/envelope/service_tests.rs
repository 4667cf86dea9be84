//! Regression coverage for this module.

use std::sync::Arc;

use mockall::Sequence;
use rstest::{fixture, rstest};
use serde_json::{Map, json};

use super::*;
use crate::domain::envelope::{EnvelopeStatus, SigningStatus};
use crate::domain::ports::{
    ArtifactRendererError, MockArtifactRenderer, MockEnvelopeRepository, MockSecurityEventLog,
    Recipient,
};
use crate::domain::signed_link::{LinkCodecConfig, SigningSecret, parse_query};
use crate::domain::{ClientContext, ErrorCode};
use crate::test_support::MutableClock;

const NOW_MS: i64 = 1_700_000_000_000;

struct Mocks {
    repository: MockEnvelopeRepository,
    renderer: MockArtifactRenderer,
    audit: MockSecurityEventLog,
}

#[fixture]
fn mocks() -> Mocks {
    let mut audit = MockSecurityEventLog::new();
    audit.expect_record().returning(|_| Ok(()));
    Mocks {
        repository: MockEnvelopeRepository::new(),
        renderer: MockArtifactRenderer::new(),
        audit,
    }
}

fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::at_millis(NOW_MS))
}

fn codec(clock: &Arc<MutableClock>) -> Arc<LinkCodec> {
    Arc::new(LinkCodec::new(
        SigningSecret::new("s").expect("secret"),
        Arc::clone(clock) as Arc<dyn Clock>,
        LinkCodecConfig::default(),
    ))
}

fn build(mocks: Mocks) -> EnvelopeService {
    let clock = clock();
    EnvelopeService::new(
        EnvelopePorts {
            repository: Arc::new(mocks.repository),
            renderer: Arc::new(mocks.renderer),
            audit: Arc::new(mocks.audit),
        },
        codec(&clock),
        clock,
        EnvelopeConfig::default(),
    )
}

fn email(raw: &str) -> SignerEmail {
    SignerEmail::parse(raw).expect("valid email")
}

fn envelope(signers: &[&str]) -> Envelope {
    let mut metadata = Map::new();
    metadata.insert("selectedPlan".to_owned(), json!("Plan B"));
    let draft = EnvelopeDraft {
        doc_type: "legacy-msa".to_owned(),
        project: ProjectId::FinalWishes,
        signers: signers.iter().map(|raw| email(raw)).collect(),
        metadata,
        guest: true,
        callback_url: Some("https://client.example.com/done".to_owned()),
    };
    Envelope::create(EnvelopeId::random(), draft, clock().utc()).expect("valid envelope")
}

fn bump(envelope: &Envelope) -> Result<Envelope, EnvelopeRepositoryError> {
    let mut stored = envelope.clone();
    stored.set_version(envelope.version() + 1);
    Ok(stored)
}

fn sign_as(envelope_id: EnvelopeId, signer: Option<&str>) -> SignEnvelopeRequest {
    SignEnvelopeRequest {
        envelope_id,
        signer_email: signer.map(str::to_owned),
        signer_name: Some("Ada Lovelace".to_owned()),
        signature_data: Some("typed:Ada".to_owned()),
        signature_image: Some("data:image/png;base64,AAAA".to_owned()),
        client: ClientContext {
            ip: Some("203.0.113.9".to_owned()),
            user_agent: Some("test-agent".to_owned()),
        },
    }
}

fn intake() -> CreateGuestEnvelopeRequest {
    CreateGuestEnvelopeRequest {
        signer_name: "Ada".to_owned(),
        signer_email: "Ada@Example.com".to_owned(),
        doc_type: None,
        project_id: Some("finalwishes".to_owned()),
        selected_plan: Some("Plan A".to_owned()),
        amount: Some(json!(50_000)),
        callback_url: None,
        metadata: Map::new(),
    }
}

#[rstest]
#[tokio::test]
async fn guest_intake_stores_envelope_and_mints_verifiable_link(mut mocks: Mocks) {
    mocks
        .repository
        .expect_create()
        .withf(|envelope| {
            envelope.is_guest()
                && envelope.doc_type() == DEFAULT_DOC_TYPE
                && envelope.signers() == [email("ada@example.com")].as_slice()
                && envelope.metadata_str("selectedPlan") == Some("Plan A")
                && envelope.metadata_str("signerName") == Some("Ada")
        })
        .times(1)
        .returning(|_| Ok(()));
    let service = build(mocks);

    let created = service
        .create_guest_envelope(intake())
        .await
        .expect("created");
    assert_eq!(created.status, EnvelopeStatus::Created);
    assert!(created.signing_url.starts_with(DEFAULT_SIGNING_BASE_URL));

    let query = created
        .signing_url
        .split_once('?')
        .map(|(_, query)| query)
        .expect("query present");
    let verified = service.links.verify(&parse_query(query)).expect("link verifies");
    let names: Vec<&str> = verified.params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        names,
        ["envelope", "project", "guest", "signer", "plan", "amount"]
    );
    assert_eq!(
        verified.param("envelope"),
        Some(created.envelope_id.to_string().as_str())
    );
    assert_eq!(verified.param("amount"), Some("50000"));
}

#[rstest]
#[case(CreateGuestEnvelopeRequest { signer_email: "nope".to_owned(), ..intake() })]
#[case(CreateGuestEnvelopeRequest { signer_name: "  ".to_owned(), ..intake() })]
#[case(CreateGuestEnvelopeRequest { project_id: Some("acme".to_owned()), ..intake() })]
#[tokio::test]
async fn guest_intake_rejects_invalid_input(
    mut mocks: Mocks,
    #[case] request: CreateGuestEnvelopeRequest,
) {
    mocks.repository.expect_create().never();
    let error = build(mocks)
        .create_guest_envelope(request)
        .await
        .expect_err("invalid");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

fn multi_intake() -> CreateEnvelopeRequest {
    CreateEnvelopeRequest {
        doc_type: "partnership-agreement".to_owned(),
        recipients: vec![
            Recipient {
                email: "Ada@Example.com".to_owned(),
                name: Some("Ada Lovelace".to_owned()),
            },
            Recipient {
                email: "grace@example.com".to_owned(),
                name: None,
            },
        ],
        project_id: None,
        metadata: Map::new(),
        callback_url: Some("https://client.example.com/done".to_owned()),
        guest: false,
    }
}

#[rstest]
#[tokio::test]
async fn intake_mints_one_link_per_signer(mut mocks: Mocks) {
    mocks
        .repository
        .expect_create()
        .withf(|envelope| {
            !envelope.is_guest()
                && envelope.doc_type() == "partnership-agreement"
                && envelope.signers()
                    == [email("ada@example.com"), email("grace@example.com")].as_slice()
                && envelope.metadata()["recipients"][0]["name"] == "Ada Lovelace"
                && envelope.metadata()["recipients"][1]["name"].is_null()
        })
        .times(1)
        .returning(|_| Ok(()));
    let service = build(mocks);

    let created = service
        .create_envelope(multi_intake())
        .await
        .expect("created");
    assert_eq!(created.status, EnvelopeStatus::Created);
    let signers: Vec<&str> = created
        .signing_links
        .iter()
        .map(|link| link.signer.as_str())
        .collect();
    assert_eq!(signers, ["ada@example.com", "grace@example.com"]);

    for link in &created.signing_links {
        let (_, query) = link.signing_url.split_once('?').expect("query present");
        let verified = service.links.verify(&parse_query(query)).expect("link verifies");
        assert_eq!(verified.param("signer"), Some(link.signer.as_str()));
        assert_eq!(verified.param("guest"), Some("false"));
        assert_eq!(
            verified.param("envelope"),
            Some(created.envelope_id.to_string().as_str())
        );
    }
}

#[rstest]
#[case(CreateEnvelopeRequest { recipients: Vec::new(), ..multi_intake() })]
#[case(CreateEnvelopeRequest { doc_type: " ".to_owned(), ..multi_intake() })]
#[case(CreateEnvelopeRequest {
    recipients: vec![
        Recipient { email: "a@example.com".to_owned(), name: None },
        Recipient { email: "A@Example.com".to_owned(), name: None },
    ],
    ..multi_intake()
})]
#[case(CreateEnvelopeRequest {
    recipients: vec![Recipient { email: "nope".to_owned(), name: None }],
    ..multi_intake()
})]
#[tokio::test]
async fn intake_rejects_invalid_signer_lists(
    mut mocks: Mocks,
    #[case] request: CreateEnvelopeRequest,
) {
    mocks.repository.expect_create().never();
    let error = build(mocks)
        .create_envelope(request)
        .await
        .expect_err("invalid");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn intake_name_is_used_when_signer_omits_one(mut mocks: Mocks) {
    let mut stored = envelope(&["ada@example.com", "grace@example.com"]);
    let mut metadata = stored.metadata().clone();
    metadata.insert(
        "recipients".to_owned(),
        json!([{ "email": "grace@example.com", "name": "Grace Hopper" }]),
    );
    stored = Envelope::create(
        stored.id(),
        EnvelopeDraft {
            doc_type: stored.doc_type().to_owned(),
            project: stored.project(),
            signers: stored.signers().to_vec(),
            metadata,
            guest: true,
            callback_url: None,
        },
        clock().utc(),
    )
    .expect("valid envelope");
    let found = stored.clone();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(found.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .withf(|envelope| envelope.signatures()[0].signer_name == "Grace Hopper")
        .times(1)
        .returning(bump);

    let mut request = sign_as(stored.id(), Some("grace@example.com"));
    request.signer_name = None;
    let accepted = build(mocks).sign(request).await.expect("signed");
    assert_eq!(accepted.status, SigningStatus::PartiallySigned);
}

#[rstest]
#[tokio::test]
async fn sole_signer_completes_and_triggers_render_once(mut mocks: Mocks) {
    let current = envelope(&["ada@example.com"]);
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .withf(|envelope| {
            envelope.signing_status() == SigningStatus::Completed
                && envelope.completed_at().is_some()
                && envelope.signatures()[0].ip_address == "203.0.113.9"
        })
        .times(1)
        .returning(bump);
    mocks
        .renderer
        .expect_render()
        .withf(move |request| {
            request.envelope_id == id.to_string()
                && request.plan_details == "Plan B"
                && request.contract_ref == format!("FINALWISHES-{}", id.short_ref())
                && request.signer_email == "ada@example.com"
        })
        .times(1)
        .returning(|_| Ok(()));

    let accepted = build(mocks)
        .sign(sign_as(id, None))
        .await
        .expect("signed");
    assert_eq!(accepted.status, SigningStatus::Completed);
    assert!(accepted.completed);
    assert_eq!(
        accepted.callback_url.as_deref(),
        Some("https://client.example.com/done")
    );
}

#[rstest]
#[tokio::test]
async fn partial_signature_does_not_render(mut mocks: Mocks) {
    let current = envelope(&["a@x.com", "b@x.com"]);
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .returning(bump);
    mocks.renderer.expect_render().never();

    let accepted = build(mocks)
        .sign(sign_as(id, Some("a@x.com")))
        .await
        .expect("signed");
    assert_eq!(accepted.status, SigningStatus::PartiallySigned);
    assert!(!accepted.completed);
    assert_eq!(accepted.callback_url, None);
}

#[rstest]
#[tokio::test]
async fn multi_signer_envelope_requires_signer_email(mut mocks: Mocks) {
    let current = envelope(&["a@x.com", "b@x.com"]);
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks.repository.expect_update_if_unchanged().never();

    let error = build(mocks).sign(sign_as(id, None)).await.expect_err("missing");
    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn lost_race_rereads_and_completes_once(mut mocks: Mocks) {
    let fresh = envelope(&["a@x.com", "b@x.com"]);
    let id = fresh.id();
    let mut after_other = fresh.clone();
    after_other
        .append_signature(SignatureRecord {
            signer: email("b@x.com"),
            signer_name: "Bea".to_owned(),
            signature_data: None,
            signature_image: None,
            signed_at: clock().utc(),
            ip_address: "unknown".to_owned(),
            user_agent: None,
        })
        .expect("other signer appends");
    after_other.set_version(1);

    let mut seq = Sequence::new();
    mocks
        .repository
        .expect_find_by_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Some(fresh.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|envelope| {
            Err(EnvelopeRepositoryError::version_conflict(
                envelope.id().to_string(),
            ))
        });
    mocks
        .repository
        .expect_find_by_id()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Some(after_other.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .times(1)
        .in_sequence(&mut seq)
        .returning(bump);
    mocks.renderer.expect_render().times(1).returning(|_| Ok(()));

    let accepted = build(mocks)
        .sign(sign_as(id, Some("a@x.com")))
        .await
        .expect("signed after retry");
    assert!(accepted.completed);
}

#[rstest]
#[tokio::test]
async fn persistent_contention_reports_conflict(mut mocks: Mocks) {
    let current = envelope(&["a@x.com"]);
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .times(5)
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .times(5)
        .returning(|envelope| {
            Err(EnvelopeRepositoryError::version_conflict(
                envelope.id().to_string(),
            ))
        });
    mocks.renderer.expect_render().never();

    let error = build(mocks)
        .sign(sign_as(id, Some("a@x.com")))
        .await
        .expect_err("conflict");
    assert_eq!(error.code(), ErrorCode::Conflict);
}

fn completed(signers: &[&str]) -> Envelope {
    let mut envelope = envelope(signers);
    for signer in signers {
        envelope
            .append_signature(SignatureRecord {
                signer: email(signer),
                signer_name: (*signer).to_owned(),
                signature_data: None,
                signature_image: None,
                signed_at: clock().utc(),
                ip_address: "unknown".to_owned(),
                user_agent: None,
            })
            .expect("append");
    }
    envelope
}

#[rstest]
#[case(completed(&["a@x.com"]), Some("a@x.com"), ErrorCode::Conflict)]
#[case(envelope(&["a@x.com"]), Some("mallory@x.com"), ErrorCode::Forbidden)]
#[case(
    {
        let mut partial = envelope(&["a@x.com", "b@x.com"]);
        partial
            .append_signature(SignatureRecord {
                signer: email("a@x.com"),
                signer_name: "Ada".to_owned(),
                signature_data: None,
                signature_image: None,
                signed_at: clock().utc(),
                ip_address: "unknown".to_owned(),
                user_agent: None,
            })
            .expect("append");
        partial
    },
    Some("a@x.com"),
    ErrorCode::Conflict
)]
#[tokio::test]
async fn rejected_signatures_write_nothing(
    mut mocks: Mocks,
    #[case] current: Envelope,
    #[case] signer: Option<&'static str>,
    #[case] expected: ErrorCode,
) {
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks.repository.expect_update_if_unchanged().never();
    mocks.renderer.expect_render().never();

    let error = build(mocks)
        .sign(sign_as(id, signer))
        .await
        .expect_err("rejected");
    assert_eq!(error.code(), expected);
}

#[rstest]
#[tokio::test]
async fn renderer_failure_does_not_fail_signing(mut mocks: Mocks) {
    let current = envelope(&["a@x.com"]);
    let id = current.id();
    mocks
        .repository
        .expect_find_by_id()
        .returning(move |_| Ok(Some(current.clone())));
    mocks
        .repository
        .expect_update_if_unchanged()
        .returning(bump);
    mocks
        .renderer
        .expect_render()
        .times(1)
        .returning(|_| Err(ArtifactRendererError::rejected(502_u16, "bad gateway")));

    let accepted = build(mocks)
        .sign(sign_as(id, Some("a@x.com")))
        .await
        .expect("signed");
    assert!(accepted.completed);
}

#[rstest]
#[tokio::test]
async fn unknown_envelope_is_not_found(mut mocks: Mocks) {
    mocks
        .repository
        .expect_find_by_id()
        .returning(|_| Ok(None));

    let service = build(mocks);
    let error = service
        .sign(sign_as(EnvelopeId::random(), Some("a@x.com")))
        .await
        .expect_err("missing");
    assert_eq!(error.code(), ErrorCode::NotFound);
    let error = service
        .get(&EnvelopeId::random())
        .await
        .expect_err("missing");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn repository_outage_is_retryable(mut mocks: Mocks) {
    mocks
        .repository
        .expect_find_by_id()
        .returning(|_| Err(EnvelopeRepositoryError::connection("refused")));

    let error = build(mocks)
        .get(&EnvelopeId::random())
        .await
        .expect_err("unavailable");
    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}
