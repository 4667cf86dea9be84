//! Envelope service implementing [`EnvelopeCommand`] and [`EnvelopeQuery`].
//!
//! Every mutation is a read-modify-conditional-write against the repository.
//! A lost race re-reads and re-applies; only the write that moves the
//! envelope into `completed` invokes the renderer.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::model::{
    Envelope, EnvelopeDraft, EnvelopeId, ProjectId, SignatureRecord, SignatureRejection,
    SignerEmail,
};
use crate::domain::ports::{
    ArtifactRenderer, CreateEnvelopeRequest, CreateGuestEnvelopeRequest, EnvelopeCommand,
    EnvelopeCreated, EnvelopeQuery, EnvelopeRepository, EnvelopeRepositoryError,
    GuestEnvelopeCreated, RenderRequest, SecurityEvent, SecurityEventKind, SecurityEventLog,
    SignEnvelopeRequest, SignatureAccepted, SignerLink,
};
use crate::domain::signed_link::{ENVELOPE_PARAM, LinkCodec, PROJECT_PARAM, SIGNER_PARAM};
use crate::domain::Error;

/// Document type used when intake omits one.
pub const DEFAULT_DOC_TYPE: &str = "legacy-msa";
/// Plan description used when metadata carries none.
pub const DEFAULT_PLAN: &str = "Standard Plan";
/// Default public signing page.
pub const DEFAULT_SIGNING_BASE_URL: &str = "https://sign.sirsi.ai/sign.html";

const SIGNER_NAME_KEY: &str = "signerName";
const PROJECT_ID_KEY: &str = "projectId";
const SELECTED_PLAN_KEY: &str = "selectedPlan";
const AMOUNT_KEY: &str = "amount";
const RECIPIENTS_KEY: &str = "recipients";
const GUEST_PARAM: &str = "guest";

/// Service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// Page the signing link points at.
    pub signing_base_url: String,
    /// Conditional-write attempts before reporting a conflict.
    pub max_write_attempts: u32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            signing_base_url: DEFAULT_SIGNING_BASE_URL.to_owned(),
            max_write_attempts: 5,
        }
    }
}

/// Collaborators for [`EnvelopeService`].
#[derive(Clone)]
pub struct EnvelopePorts {
    /// Envelope storage.
    pub repository: Arc<dyn EnvelopeRepository>,
    /// Completion hook.
    pub renderer: Arc<dyn ArtifactRenderer>,
    /// Audit trail.
    pub audit: Arc<dyn SecurityEventLog>,
}

/// Envelope lifecycle service.
#[derive(Clone)]
pub struct EnvelopeService {
    repository: Arc<dyn EnvelopeRepository>,
    renderer: Arc<dyn ArtifactRenderer>,
    audit: Arc<dyn SecurityEventLog>,
    links: Arc<LinkCodec>,
    clock: Arc<dyn Clock>,
    config: EnvelopeConfig,
}

fn metadata_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl EnvelopeService {
    /// Build the service.
    pub fn new(
        ports: EnvelopePorts,
        links: Arc<LinkCodec>,
        clock: Arc<dyn Clock>,
        config: EnvelopeConfig,
    ) -> Self {
        Self {
            repository: ports.repository,
            renderer: ports.renderer,
            audit: ports.audit,
            links,
            clock,
            config,
        }
    }

    fn map_repository_error(error: EnvelopeRepositoryError) -> Error {
        match error {
            EnvelopeRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("envelope repository unavailable: {message}"))
            }
            EnvelopeRepositoryError::Query { message } => {
                Error::service_unavailable(format!("envelope repository error: {message}"))
            }
            EnvelopeRepositoryError::DuplicateEnvelope { envelope_id } => {
                Error::conflict(format!("envelope {envelope_id} already exists"))
            }
            EnvelopeRepositoryError::VersionConflict { envelope_id } => {
                Error::conflict(format!("envelope {envelope_id} is being modified; retry"))
            }
        }
    }

    fn map_rejection(rejection: SignatureRejection) -> Error {
        match rejection {
            SignatureRejection::AlreadyCompleted => {
                Error::conflict("envelope already completed").with_details(
                    serde_json::json!({ "code": "already_completed" }),
                )
            }
            SignatureRejection::UnknownSigner(_) => {
                Error::forbidden("signer is not part of this envelope")
            }
            SignatureRejection::AlreadySigned(_) => Error::conflict("signer has already signed")
                .with_details(serde_json::json!({ "code": "duplicate_signer" })),
        }
    }

    fn resolve_project(
        requested: Option<&str>,
        metadata: &Map<String, Value>,
    ) -> Result<ProjectId, Error> {
        match requested.or_else(|| metadata.get(PROJECT_ID_KEY).and_then(Value::as_str)) {
            Some(raw) => raw
                .parse::<ProjectId>()
                .map_err(|err| Error::invalid_request(err.to_string())),
            None => Ok(ProjectId::default()),
        }
    }

    fn mint_link(&self, params: &[(String, String)]) -> Result<String, Error> {
        self.links
            .mint(&self.config.signing_base_url, params)
            .map(|url| url.to_string())
            .map_err(|err| Error::internal(format!("failed to mint signing link: {err}")))
    }

    async fn store_new(&self, envelope: &Envelope) -> Result<(), Error> {
        self.repository
            .create(envelope)
            .await
            .map_err(Self::map_repository_error)
    }

    /// Name recorded at intake for `signer`, if any.
    fn recipient_name<'a>(envelope: &'a Envelope, signer: &SignerEmail) -> Option<&'a str> {
        envelope
            .metadata()
            .get(RECIPIENTS_KEY)
            .and_then(Value::as_array)?
            .iter()
            .find(|entry| entry.get("email").and_then(Value::as_str) == Some(signer.as_ref()))
            .and_then(|entry| entry.get("name"))
            .and_then(Value::as_str)
    }

    async fn load(&self, envelope_id: &EnvelopeId) -> Result<Envelope, Error> {
        self.repository
            .find_by_id(envelope_id)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or_else(|| Error::not_found("envelope not found"))
    }

    fn resolve_signer(
        envelope: &Envelope,
        requested: Option<&str>,
    ) -> Result<SignerEmail, Error> {
        match requested.map(str::trim).filter(|email| !email.is_empty()) {
            Some(raw) => SignerEmail::parse(raw)
                .map_err(|err| Error::invalid_request(format!("signerEmail: {err}"))),
            None => match envelope.signers() {
                [sole] => Ok(sole.clone()),
                _ => Err(Error::invalid_request("signerEmail is required")),
            },
        }
    }

    fn signature_record(
        &self,
        envelope: &Envelope,
        signer: SignerEmail,
        request: &SignEnvelopeRequest,
    ) -> SignatureRecord {
        let signer_name = request
            .signer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| Self::recipient_name(envelope, &signer))
            .or_else(|| envelope.metadata_str(SIGNER_NAME_KEY))
            .map_or_else(|| signer.to_string(), str::to_owned);
        SignatureRecord {
            signer,
            signer_name,
            signature_data: request.signature_data.clone(),
            signature_image: request.signature_image.clone(),
            signed_at: self.clock.utc(),
            ip_address: request.client.ip_or_unknown(),
            user_agent: request.client.user_agent.clone(),
        }
    }

    fn render_request(envelope: &Envelope, record: &SignatureRecord) -> RenderRequest {
        let project = envelope.project();
        RenderRequest {
            envelope_id: envelope.id().to_string(),
            project_id: project.as_str().to_owned(),
            signer_name: record.signer_name.clone(),
            signer_email: record.signer.to_string(),
            signature_image: record.signature_image.clone(),
            signed_at: record.signed_at,
            plan_details: envelope
                .metadata_str(SELECTED_PLAN_KEY)
                .filter(|plan| !plan.is_empty())
                .unwrap_or(DEFAULT_PLAN)
                .to_owned(),
            contract_ref: format!(
                "{}-{}",
                project.as_str().to_uppercase(),
                envelope.id().short_ref()
            ),
        }
    }

    async fn on_completed(&self, envelope: &Envelope, record: &SignatureRecord) {
        let request = Self::render_request(envelope, record);
        match self.renderer.render(&request).await {
            Ok(()) => info!(
                envelope_id = %envelope.id(),
                contract_ref = %request.contract_ref,
                "executed document rendered"
            ),
            Err(err) => warn!(
                envelope_id = %envelope.id(),
                error = %err,
                "renderer failed for completed envelope"
            ),
        }
    }

    async fn audit(&self, event: SecurityEvent) {
        if let Err(err) = self.audit.record(event).await {
            warn!(error = %err, "failed to write security event");
        }
    }
}

#[async_trait]
impl EnvelopeCommand for EnvelopeService {
    async fn create_envelope(
        &self,
        request: CreateEnvelopeRequest,
    ) -> Result<EnvelopeCreated, Error> {
        let CreateEnvelopeRequest {
            doc_type,
            recipients,
            project_id,
            mut metadata,
            callback_url,
            guest,
        } = request;

        if recipients.is_empty() {
            return Err(Error::invalid_request("at least one recipient is required"));
        }
        let mut signers = Vec::with_capacity(recipients.len());
        let mut listed = Vec::with_capacity(recipients.len());
        for (index, recipient) in recipients.iter().enumerate() {
            let signer = SignerEmail::parse(&recipient.email).map_err(|err| {
                Error::invalid_request(format!("recipients[{index}].email: {err}"))
            })?;
            let name = recipient
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty());
            listed.push(json!({ "email": signer.as_ref(), "name": name }));
            signers.push(signer);
        }
        let project = Self::resolve_project(project_id.as_deref(), &metadata)?;
        metadata.insert(PROJECT_ID_KEY.to_owned(), Value::from(project.as_str()));
        metadata.insert(RECIPIENTS_KEY.to_owned(), Value::Array(listed));

        let envelope_id = EnvelopeId::random();
        let draft = EnvelopeDraft {
            doc_type,
            project,
            signers,
            metadata,
            guest,
            callback_url: callback_url.filter(|url| !url.trim().is_empty()),
        };
        let envelope = Envelope::create(envelope_id, draft, self.clock.utc())
            .map_err(|err| Error::invalid_request(err.to_string()))?;

        let signing_links = envelope
            .signers()
            .iter()
            .map(|signer| -> Result<SignerLink, Error> {
                let params = vec![
                    (ENVELOPE_PARAM.to_owned(), envelope_id.to_string()),
                    (PROJECT_PARAM.to_owned(), project.as_str().to_owned()),
                    (GUEST_PARAM.to_owned(), guest.to_string()),
                    (SIGNER_PARAM.to_owned(), signer.to_string()),
                ];
                Ok(SignerLink {
                    signer: signer.to_string(),
                    signing_url: self.mint_link(&params)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store_new(&envelope).await?;

        info!(
            envelope_id = %envelope_id,
            project = project.as_str(),
            signers = signing_links.len(),
            "envelope created"
        );
        Ok(EnvelopeCreated {
            envelope_id,
            status: envelope.status(),
            signing_links,
        })
    }

    async fn create_guest_envelope(
        &self,
        request: CreateGuestEnvelopeRequest,
    ) -> Result<GuestEnvelopeCreated, Error> {
        let CreateGuestEnvelopeRequest {
            signer_name,
            signer_email,
            doc_type,
            project_id,
            selected_plan,
            amount,
            callback_url,
            mut metadata,
        } = request;

        let signer = SignerEmail::parse(&signer_email)
            .map_err(|err| Error::invalid_request(format!("signerEmail: {err}")))?;
        let signer_name = signer_name.trim().to_owned();
        if signer_name.is_empty() {
            return Err(Error::invalid_request("signerName is required"));
        }
        let project = Self::resolve_project(project_id.as_deref(), &metadata)?;

        metadata.insert(PROJECT_ID_KEY.to_owned(), Value::from(project.as_str()));
        metadata.insert(SIGNER_NAME_KEY.to_owned(), Value::from(signer_name));
        if let Some(plan) = selected_plan {
            metadata.insert(SELECTED_PLAN_KEY.to_owned(), Value::from(plan));
        }
        if let Some(amount) = amount {
            metadata.insert(AMOUNT_KEY.to_owned(), amount);
        }
        let plan = metadata.get(SELECTED_PLAN_KEY).map(metadata_text).unwrap_or_default();
        let amount = metadata.get(AMOUNT_KEY).map(metadata_text).unwrap_or_default();

        let envelope_id = EnvelopeId::random();
        let link_params = vec![
            (ENVELOPE_PARAM.to_owned(), envelope_id.to_string()),
            (PROJECT_PARAM.to_owned(), project.as_str().to_owned()),
            (GUEST_PARAM.to_owned(), "true".to_owned()),
            (SIGNER_PARAM.to_owned(), signer.to_string()),
            ("plan".to_owned(), plan),
            (AMOUNT_KEY.to_owned(), amount),
        ];
        let signing_url = self.mint_link(&link_params)?;

        let draft = EnvelopeDraft {
            doc_type: doc_type.unwrap_or_else(|| DEFAULT_DOC_TYPE.to_owned()),
            project,
            signers: vec![signer],
            metadata,
            guest: true,
            callback_url: callback_url.filter(|url| !url.trim().is_empty()),
        };
        let envelope = Envelope::create(envelope_id, draft, self.clock.utc())
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.store_new(&envelope).await?;

        info!(envelope_id = %envelope_id, project = project.as_str(), "guest envelope created");
        Ok(GuestEnvelopeCreated {
            envelope_id,
            signing_url,
            status: envelope.status(),
        })
    }

    async fn sign(&self, request: SignEnvelopeRequest) -> Result<SignatureAccepted, Error> {
        let attempts = self.config.max_write_attempts.max(1);
        for attempt in 1..=attempts {
            let mut envelope = self.load(&request.envelope_id).await?;
            let signer = Self::resolve_signer(&envelope, request.signer_email.as_deref())?;
            let record = self.signature_record(&envelope, signer, &request);
            let transition = envelope
                .append_signature(record.clone())
                .map_err(Self::map_rejection)?;

            let stored = match self.repository.update_if_unchanged(&envelope).await {
                Ok(stored) => stored,
                Err(EnvelopeRepositoryError::VersionConflict { .. }) => {
                    warn!(
                        envelope_id = %request.envelope_id,
                        attempt,
                        "lost signature race; retrying"
                    );
                    continue;
                }
                Err(err) => return Err(Self::map_repository_error(err)),
            };

            self.audit(
                SecurityEvent::new(SecurityEventKind::GuestEnvelopeSigned, request.client.clone())
                    .with_envelope(stored.id().to_string())
                    .with_subject(record.signer.to_string()),
            )
            .await;
            if transition.completed_now {
                self.on_completed(&stored, &record).await;
            }

            return Ok(SignatureAccepted {
                status: transition.status,
                completed: transition.completed_now,
                callback_url: if transition.completed_now {
                    stored.callback_url().map(str::to_owned)
                } else {
                    None
                },
            });
        }
        Err(Error::conflict("envelope is being modified concurrently; retry"))
    }
}

#[async_trait]
impl EnvelopeQuery for EnvelopeService {
    async fn get(&self, envelope_id: &EnvelopeId) -> Result<Envelope, Error> {
        self.load(envelope_id).await
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
