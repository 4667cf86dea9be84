//! Driving port for envelope mutations: intake and signing.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::envelope::{EnvelopeId, EnvelopeStatus, SigningStatus};
use crate::domain::{ClientContext, Error};

/// A required signer on a new envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Signer email; normalised on intake.
    pub email: String,
    /// Display name, if known.
    pub name: Option<String>,
}

/// Intake request for an envelope with one or more signers.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEnvelopeRequest {
    /// Document template type.
    pub doc_type: String,
    /// Required signers in signing order.
    pub recipients: Vec<Recipient>,
    /// Owning project; `sirsi` when absent.
    pub project_id: Option<String>,
    /// Free-form metadata stored with the envelope.
    pub metadata: Map<String, Value>,
    /// Where to send the client after completion.
    pub callback_url: Option<String>,
    /// Whether signers may use the guest endpoints.
    pub guest: bool,
}

/// Signed link minted for one signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerLink {
    /// Normalised signer email.
    pub signer: String,
    /// Link carrying the signer identity.
    pub signing_url: String,
}

/// Intake result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeCreated {
    /// New envelope id.
    pub envelope_id: EnvelopeId,
    /// Derived status, always `created`.
    pub status: EnvelopeStatus,
    /// One link per signer, in signer order.
    pub signing_links: Vec<SignerLink>,
}

/// Guest intake request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateGuestEnvelopeRequest {
    /// Display name of the single signer.
    pub signer_name: String,
    /// Email of the single signer.
    pub signer_email: String,
    /// Document template; `legacy-msa` when absent.
    pub doc_type: Option<String>,
    /// Owning project; `sirsi` when absent.
    pub project_id: Option<String>,
    /// Selected pricing plan.
    pub selected_plan: Option<String>,
    /// Quoted amount, passed through as given.
    pub amount: Option<Value>,
    /// Where to send the client after completion.
    pub callback_url: Option<String>,
    /// Extra metadata merged underneath the fields above.
    pub metadata: Map<String, Value>,
}

/// Guest intake result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestEnvelopeCreated {
    /// New envelope id.
    pub envelope_id: EnvelopeId,
    /// Signed link for the signer.
    pub signing_url: String,
    /// Derived status, always `created`.
    pub status: EnvelopeStatus,
}

/// Signature submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignEnvelopeRequest {
    /// Envelope being signed.
    pub envelope_id: EnvelopeId,
    /// Signer identity; the sole signer is assumed when absent.
    pub signer_email: Option<String>,
    /// Display name at signing time.
    pub signer_name: Option<String>,
    /// Typed or drawn signature payload.
    pub signature_data: Option<String>,
    /// Signature image reference or data URL.
    pub signature_image: Option<String>,
    /// Caller details recorded with the signature.
    pub client: ClientContext,
}

/// Signature submission result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAccepted {
    /// Signing status after the append.
    pub status: SigningStatus,
    /// Whether this signature completed the envelope.
    pub completed: bool,
    /// Client redirect, only once completed.
    pub callback_url: Option<String>,
}

/// Domain use-case port for envelope mutations.
///
/// Signing is safe to retry with the same input: a lost race is retried
/// internally and a repeated signature is reported as a conflict.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvelopeCommand: Send + Sync {
    /// Create an envelope for the given signers and mint a link for each.
    async fn create_envelope(
        &self,
        request: CreateEnvelopeRequest,
    ) -> Result<EnvelopeCreated, Error>;

    /// Create a single-signer guest envelope and mint its signing link.
    async fn create_guest_envelope(
        &self,
        request: CreateGuestEnvelopeRequest,
    ) -> Result<GuestEnvelopeCreated, Error>;

    /// Append a signature and recompute completion.
    async fn sign(&self, request: SignEnvelopeRequest) -> Result<SignatureAccepted, Error>;
}
