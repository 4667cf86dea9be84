//! Envelope aggregate and lifecycle service.

mod model;
mod service;

pub use model::{
    Envelope, EnvelopeDraft, EnvelopeId, EnvelopeStatus, EnvelopeValidationError,
    PaymentStatus, PaymentTransition, ProjectId, SignatureRecord, SignatureRejection,
    SignatureTransition, SignerEmail, SigningStatus,
};
pub use service::{
    DEFAULT_DOC_TYPE, DEFAULT_PLAN, DEFAULT_SIGNING_BASE_URL, EnvelopeConfig, EnvelopePorts,
    EnvelopeService,
};
