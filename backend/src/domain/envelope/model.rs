//! Envelope aggregate and its signing and payment axes.
//!
//! Signing progress and payment progress are independent fields; the legacy
//! single `status` string is only ever derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

/// Validation failures for envelope inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeValidationError {
    /// Envelope id is not a UUID.
    #[error("envelope id must be a UUID")]
    InvalidEnvelopeId,
    /// Email address is not plausibly deliverable.
    #[error("invalid email address")]
    InvalidEmail,
    /// Project is not one of the known tenants.
    #[error("unknown project: {0}")]
    UnknownProject(String),
    /// At least one signer is required.
    #[error("an envelope requires at least one signer")]
    NoSigners,
    /// The same signer was listed twice.
    #[error("signer {0} is listed more than once")]
    DuplicateSigner(String),
    /// Document type is blank.
    #[error("document type must not be empty")]
    EmptyDocType,
}

/// Envelope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(Uuid);

impl EnvelopeId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Short reference used on rendered contracts: first eight characters.
    #[must_use]
    pub fn short_ref(&self) -> String {
        self.0.simple().to_string().chars().take(8).collect()
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EnvelopeId {
    type Err = EnvelopeValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| EnvelopeValidationError::InvalidEnvelopeId)
    }
}

/// Normalised (trimmed, lower-cased) signer email.
///
/// # Examples
/// ```
/// use envelope_backend::domain::envelope::SignerEmail;
///
/// let email = SignerEmail::parse(" Alice@Example.com ").expect("valid email");
/// assert_eq!(email.as_ref(), "alice@example.com");
/// assert!(SignerEmail::parse("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignerEmail(String);

impl SignerEmail {
    /// Validate and normalise an email address.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeValidationError> {
        let candidate = raw.trim().to_lowercase();
        let Some((local, domain)) = candidate.split_once('@') else {
            return Err(EnvelopeValidationError::InvalidEmail);
        };
        let domain_ok = domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        let valid = !local.is_empty()
            && domain_ok
            && !domain.contains('@')
            && !candidate.chars().any(char::is_whitespace);
        if valid {
            Ok(Self(candidate))
        } else {
            Err(EnvelopeValidationError::InvalidEmail)
        }
    }
}

impl AsRef<str> for SignerEmail {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SignerEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SignerEmail {
    type Error = EnvelopeValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SignerEmail> for String {
    fn from(value: SignerEmail) -> Self {
        value.0
    }
}

/// Tenant that owns an envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProjectId {
    /// FinalWishes estate planning.
    #[serde(rename = "finalwishes")]
    FinalWishes,
    /// Assiduous real estate.
    Assiduous,
    /// Sirsi platform (default).
    #[default]
    Sirsi,
}

impl ProjectId {
    /// Wire name of the project.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FinalWishes => "finalwishes",
            Self::Assiduous => "assiduous",
            Self::Sirsi => "sirsi",
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectId {
    type Err = EnvelopeValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finalwishes" => Ok(Self::FinalWishes),
            "assiduous" => Ok(Self::Assiduous),
            "sirsi" => Ok(Self::Sirsi),
            other => Err(EnvelopeValidationError::UnknownProject(other.to_owned())),
        }
    }
}

/// Progress along the signing axis. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// No signatures collected yet.
    Created,
    /// Some but not all signers have signed.
    PartiallySigned,
    /// Every signer has signed.
    Completed,
}

/// Progress along the payment axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout finished but funds have not settled.
    WaitingForPayment,
    /// Funds settled. Terminal.
    Paid,
    /// Asynchronous settlement failed.
    PaymentFailed,
}

impl PaymentStatus {
    /// Whether moving from `current` to `self` is allowed.
    ///
    /// `paid` is terminal, `payment_failed` may still settle to `paid`, and
    /// nothing returns to `waiting_for_payment` once a verdict exists.
    #[must_use]
    pub fn may_follow(self, current: Option<Self>) -> bool {
        match (current, self) {
            (None, _) => true,
            (Some(Self::Paid), _) => false,
            (Some(from), to) if from == to => false,
            (Some(Self::PaymentFailed), Self::WaitingForPayment) => false,
            (Some(_), _) => true,
        }
    }
}

/// Single-string status kept for clients that predate the split axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// See [`SigningStatus::Created`].
    Created,
    /// See [`SigningStatus::PartiallySigned`].
    PartiallySigned,
    /// See [`SigningStatus::Completed`].
    Completed,
    /// See [`PaymentStatus::WaitingForPayment`].
    WaitingForPayment,
    /// See [`PaymentStatus::Paid`].
    Paid,
    /// See [`PaymentStatus::PaymentFailed`].
    PaymentFailed,
}

/// One collected signature. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    /// Signer identity.
    pub signer: SignerEmail,
    /// Display name supplied at signing time.
    pub signer_name: String,
    /// Typed or drawn signature payload.
    pub signature_data: Option<String>,
    /// Reference to (or data URL of) the signature image.
    pub signature_image: Option<String>,
    /// When the signature was recorded.
    pub signed_at: DateTime<Utc>,
    /// Submitting IP address.
    pub ip_address: String,
    /// Submitting user agent.
    pub user_agent: Option<String>,
}

/// Why a signature was not appended.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureRejection {
    /// The envelope already reached `completed`.
    #[error("envelope already completed")]
    AlreadyCompleted,
    /// The identity is not one of the envelope's signers.
    #[error("{0} is not a signer of this envelope")]
    UnknownSigner(SignerEmail),
    /// The identity already signed.
    #[error("{0} has already signed")]
    AlreadySigned(SignerEmail),
}

/// Result of appending a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureTransition {
    /// Signing status after the append.
    pub status: SigningStatus,
    /// `true` only for the append that moved the envelope into `completed`.
    pub completed_now: bool,
}

/// Result of applying a payment verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    /// The payment status changed.
    Applied {
        /// Previous payment status.
        from: Option<PaymentStatus>,
        /// New payment status.
        to: PaymentStatus,
        /// `true` when this transition claimed the one provisioning notice.
        provision: bool,
    },
    /// The verdict would move the status backwards or sideways; ignored.
    Unchanged {
        /// Payment status left in place.
        current: Option<PaymentStatus>,
    },
}

/// Inputs for a new envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeDraft {
    /// Document template type.
    pub doc_type: String,
    /// Owning tenant.
    pub project: ProjectId,
    /// Required signers in order.
    pub signers: Vec<SignerEmail>,
    /// Free-form metadata such as the selected plan and amount.
    pub metadata: Map<String, Value>,
    /// Whether unauthenticated guest signing is allowed.
    pub guest: bool,
    /// Where the client is sent once signing completes.
    pub callback_url: Option<String>,
}

/// Envelope aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    id: EnvelopeId,
    doc_type: String,
    project: ProjectId,
    signers: Vec<SignerEmail>,
    signing_status: SigningStatus,
    payment_status: Option<PaymentStatus>,
    signatures: Vec<SignatureRecord>,
    metadata: Map<String, Value>,
    guest: bool,
    callback_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    provisioned_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Envelope {
    /// Create an envelope in `created` with no payment status.
    pub fn create(
        id: EnvelopeId,
        draft: EnvelopeDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, EnvelopeValidationError> {
        let EnvelopeDraft {
            doc_type,
            project,
            signers,
            metadata,
            guest,
            callback_url,
        } = draft;

        let doc_type = doc_type.trim().to_owned();
        if doc_type.is_empty() {
            return Err(EnvelopeValidationError::EmptyDocType);
        }
        if signers.is_empty() {
            return Err(EnvelopeValidationError::NoSigners);
        }
        for (index, signer) in signers.iter().enumerate() {
            if signers.iter().take(index).any(|earlier| earlier == signer) {
                return Err(EnvelopeValidationError::DuplicateSigner(signer.to_string()));
            }
        }

        Ok(Self {
            id,
            doc_type,
            project,
            signers,
            signing_status: SigningStatus::Created,
            payment_status: None,
            signatures: Vec::new(),
            metadata,
            guest,
            callback_url,
            created_at: now,
            updated_at: now,
            completed_at: None,
            provisioned_at: None,
            version: 0,
        })
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> EnvelopeId {
        self.id
    }

    /// Document type.
    #[must_use]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Owning project.
    #[must_use]
    pub const fn project(&self) -> ProjectId {
        self.project
    }

    /// Required signers, fixed at creation.
    #[must_use]
    pub fn signers(&self) -> &[SignerEmail] {
        &self.signers
    }

    /// Signing-axis status.
    #[must_use]
    pub const fn signing_status(&self) -> SigningStatus {
        self.signing_status
    }

    /// Payment-axis status, if a payment verdict has been applied.
    #[must_use]
    pub const fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment_status
    }

    /// Collected signatures in append order.
    #[must_use]
    pub fn signatures(&self) -> &[SignatureRecord] {
        &self.signatures
    }

    /// Free-form metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// String metadata value, if present.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Whether guests may sign without an account.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.guest
    }

    /// Client redirect once signing completes.
    #[must_use]
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    /// Creation instant.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last mutation instant.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// When the envelope reached `completed`.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// When the provisioning notice was claimed.
    #[must_use]
    pub const fn provisioned_at(&self) -> Option<DateTime<Utc>> {
        self.provisioned_at
    }

    /// Optimistic concurrency version; bumped by every successful write.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Record a new stored version. Only repositories call this.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Signers that have not signed yet, in signer order.
    #[must_use]
    pub fn unsigned_signers(&self) -> Vec<&SignerEmail> {
        self.signers
            .iter()
            .filter(|signer| !self.has_signed(signer))
            .collect()
    }

    fn has_signed(&self, signer: &SignerEmail) -> bool {
        self.signatures.iter().any(|record| &record.signer == signer)
    }

    /// Derived legacy status: the payment verdict when one exists, otherwise
    /// the signing status.
    #[must_use]
    pub const fn status(&self) -> EnvelopeStatus {
        match (self.payment_status, self.signing_status) {
            (Some(PaymentStatus::WaitingForPayment), _) => EnvelopeStatus::WaitingForPayment,
            (Some(PaymentStatus::Paid), _) => EnvelopeStatus::Paid,
            (Some(PaymentStatus::PaymentFailed), _) => EnvelopeStatus::PaymentFailed,
            (None, SigningStatus::Created) => EnvelopeStatus::Created,
            (None, SigningStatus::PartiallySigned) => EnvelopeStatus::PartiallySigned,
            (None, SigningStatus::Completed) => EnvelopeStatus::Completed,
        }
    }

    /// Append a signature and recompute completion by set difference over
    /// signer identities.
    pub fn append_signature(
        &mut self,
        record: SignatureRecord,
    ) -> Result<SignatureTransition, SignatureRejection> {
        if self.signing_status == SigningStatus::Completed {
            return Err(SignatureRejection::AlreadyCompleted);
        }
        if !self.signers.contains(&record.signer) {
            return Err(SignatureRejection::UnknownSigner(record.signer));
        }
        if self.has_signed(&record.signer) {
            return Err(SignatureRejection::AlreadySigned(record.signer));
        }

        let signed_at = record.signed_at;
        self.signatures.push(record);
        self.updated_at = signed_at;

        let completed_now = self.unsigned_signers().is_empty();
        if completed_now {
            self.signing_status = SigningStatus::Completed;
            self.completed_at = Some(signed_at);
        } else {
            self.signing_status = SigningStatus::PartiallySigned;
        }
        Ok(SignatureTransition {
            status: self.signing_status,
            completed_now,
        })
    }

    /// Apply a payment verdict if it moves the payment axis forward.
    ///
    /// Reaching `paid` for the first time claims the provisioning notice by
    /// stamping `provisioned_at` in the same write.
    pub fn apply_payment(&mut self, target: PaymentStatus, now: DateTime<Utc>) -> PaymentTransition {
        let current = self.payment_status;
        if !target.may_follow(current) {
            return PaymentTransition::Unchanged { current };
        }

        self.payment_status = Some(target);
        self.updated_at = now;
        let provision = target == PaymentStatus::Paid && self.provisioned_at.is_none();
        if provision {
            self.provisioned_at = Some(now);
        }
        PaymentTransition::Applied {
            from: current,
            to: target,
            provision,
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
