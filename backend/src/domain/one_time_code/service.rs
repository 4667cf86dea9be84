//! MFA service implementing [`MfaCommand`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::channel::{CHANNEL_CODE_TTL_MS, ChannelCode, DeliveryMethod, MfaMethod, OneTimeCodeRecord};
use super::totp::{TOTP_SKEW_STEPS, TOTP_STEP_SECS, TotpSecret, matching_step, provisioning_uri};
use crate::domain::envelope::SignerEmail;
use crate::domain::ports::{
    CodeDelivery, CodeIssued, MfaChallenge, MfaCommand, MfaVerified, Notifier,
    OneTimeCodeStore, OneTimeCodeStoreError, ProvisionTotpRequest, ReplayGuard,
    ReplayGuardError, SecurityEvent, SecurityEventKind, SecurityEventLog, SendCodeRequest,
    TotpProvisioning, TotpSecretStore, TotpSecretStoreError, VerifyMfaRequest,
};
use crate::domain::{ClientContext, Error};

const VERIFICATION_FAILED: &str = "verification failed";
const ISSUANCE_THROTTLED: &str = "too many codes requested; try again later";

/// Tunables for code issuance and TOTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaConfig {
    /// Lifetime of channel codes.
    pub code_ttl: TimeDelta,
    /// Wrong guesses tolerated before a code is invalidated.
    pub max_attempts: u32,
    /// Codes a single target may be issued within `issue_window`.
    pub issue_limit: u32,
    /// Window over which issuance to one target is counted.
    pub issue_window: TimeDelta,
    /// Issuer label in provisioning URIs.
    pub totp_issuer: String,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            code_ttl: TimeDelta::milliseconds(CHANNEL_CODE_TTL_MS),
            max_attempts: 5,
            issue_limit: 3,
            issue_window: TimeDelta::minutes(10),
            totp_issuer: "Sirsi".to_owned(),
        }
    }
}

/// Issues and verifies channel codes and TOTPs.
#[derive(Clone)]
pub struct MfaService {
    codes: Arc<dyn OneTimeCodeStore>,
    totp_secrets: Arc<dyn TotpSecretStore>,
    replay_guard: Arc<dyn ReplayGuard>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn SecurityEventLog>,
    clock: Arc<dyn Clock>,
    config: MfaConfig,
}

/// Collaborators for [`MfaService`].
#[derive(Clone)]
pub struct MfaPorts {
    /// Channel code storage.
    pub codes: Arc<dyn OneTimeCodeStore>,
    /// TOTP secret storage.
    pub totp_secrets: Arc<dyn TotpSecretStore>,
    /// Used-step tracking for TOTP and issuance slots for channel codes.
    pub replay_guard: Arc<dyn ReplayGuard>,
    /// Code delivery.
    pub notifier: Arc<dyn Notifier>,
    /// Audit trail.
    pub audit: Arc<dyn SecurityEventLog>,
}

/// Why a verification failed. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Denial {
    NoActiveCode,
    CodeMismatch,
    AttemptsExhausted,
    AlreadyConsumed,
    NotProvisioned,
    TotpMismatch,
    TotpReused,
}

impl Denial {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveCode => "no_active_code",
            Self::CodeMismatch => "code_mismatch",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::AlreadyConsumed => "already_consumed",
            Self::NotProvisioned => "totp_not_provisioned",
            Self::TotpMismatch => "totp_mismatch",
            Self::TotpReused => "totp_reused",
        }
    }
}

type Outcome = Result<Option<String>, Denial>;

impl MfaService {
    /// Build the service from its collaborators.
    pub fn new(ports: MfaPorts, clock: Arc<dyn Clock>, config: MfaConfig) -> Self {
        let MfaPorts {
            codes,
            totp_secrets,
            replay_guard,
            notifier,
            audit,
        } = ports;
        Self {
            codes,
            totp_secrets,
            replay_guard,
            notifier,
            audit,
            clock,
            config,
        }
    }

    fn map_code_store_error(error: OneTimeCodeStoreError) -> Error {
        match error {
            OneTimeCodeStoreError::Connection { message } => {
                Error::service_unavailable(format!("code store unavailable: {message}"))
            }
            OneTimeCodeStoreError::Query { message } => {
                Error::service_unavailable(format!("code store error: {message}"))
            }
        }
    }

    fn map_totp_store_error(error: TotpSecretStoreError) -> Error {
        match error {
            TotpSecretStoreError::Connection { message } => {
                Error::service_unavailable(format!("TOTP store unavailable: {message}"))
            }
            TotpSecretStoreError::Query { message } => {
                Error::service_unavailable(format!("TOTP store error: {message}"))
            }
        }
    }

    fn map_replay_error(error: ReplayGuardError) -> Error {
        Error::service_unavailable(error.to_string())
    }

    fn normalise_target(method: DeliveryMethod, raw: &str) -> Result<String, Error> {
        let target = method.normalise_target(raw);
        let valid = match method {
            DeliveryMethod::Email => SignerEmail::parse(&target).is_ok(),
            DeliveryMethod::Sms => target.chars().filter(char::is_ascii_digit).count() >= 7,
        };
        if valid {
            Ok(target)
        } else {
            Err(Error::invalid_request(format!(
                "target is not a valid {method} destination"
            )))
        }
    }

    /// Claim one of the target's issuance slots. Each slot stays taken for
    /// the issuance window, so a target gets at most `issue_limit` codes per
    /// window and at most `issue_limit * max_attempts` guesses.
    async fn claim_issuance_slot(&self, target: &str) -> Result<(), Error> {
        for slot in 0..self.config.issue_limit {
            let claimed = self
                .replay_guard
                .check_and_insert(&format!("issue:{target}:{slot}"), self.config.issue_window)
                .await
                .map_err(Self::map_replay_error)?;
            if claimed {
                return Ok(());
            }
        }
        debug!(limit = self.config.issue_limit, "code issuance throttled");
        Err(Error::too_many_requests(ISSUANCE_THROTTLED))
    }

    async fn audit(&self, event: SecurityEvent) {
        if let Err(err) = self.audit.record(event).await {
            warn!(error = %err, "failed to write security event");
        }
    }

    async fn verify_channel(
        &self,
        target: &str,
        method: DeliveryMethod,
        code: &str,
    ) -> Result<Outcome, Error> {
        let target = method.normalise_target(target);
        let now = self.clock.utc();
        let Some(record) = self
            .codes
            .find_active(&target, now)
            .await
            .map_err(Self::map_code_store_error)?
        else {
            return Ok(Err(Denial::NoActiveCode));
        };

        if record.failed_attempts >= self.config.max_attempts {
            self.codes
                .consume(record.id)
                .await
                .map_err(Self::map_code_store_error)?;
            return Ok(Err(Denial::AttemptsExhausted));
        }

        if record.method != method || !record.code.matches(code) {
            let attempts = self
                .codes
                .record_failed_attempt(record.id)
                .await
                .map_err(Self::map_code_store_error)?;
            if attempts >= self.config.max_attempts {
                self.codes
                    .consume(record.id)
                    .await
                    .map_err(Self::map_code_store_error)?;
                return Ok(Err(Denial::AttemptsExhausted));
            }
            return Ok(Err(Denial::CodeMismatch));
        }

        let consumed = self
            .codes
            .consume(record.id)
            .await
            .map_err(Self::map_code_store_error)?;
        if consumed {
            Ok(Ok(record.user_id))
        } else {
            Ok(Err(Denial::AlreadyConsumed))
        }
    }

    async fn verify_totp(&self, user_id: &str, code: &str) -> Result<Outcome, Error> {
        let Some(enrollment) = self
            .totp_secrets
            .find(user_id)
            .await
            .map_err(Self::map_totp_store_error)?
        else {
            return Ok(Err(Denial::NotProvisioned));
        };

        let step = matching_step(&enrollment.secret, code, self.clock.utc())
            .map_err(|err| Error::internal(format!("stored TOTP secret unusable: {err}")))?;
        let Some(step) = step else {
            return Ok(Err(Denial::TotpMismatch));
        };

        let window = TimeDelta::seconds(TOTP_STEP_SECS * (2 * TOTP_SKEW_STEPS + 1));
        let fresh = self
            .replay_guard
            .check_and_insert(&format!("totp:{user_id}:{step}"), window)
            .await
            .map_err(Self::map_replay_error)?;
        if !fresh {
            return Ok(Err(Denial::TotpReused));
        }

        if !enrollment.enrolled {
            self.totp_secrets
                .mark_enrolled(user_id)
                .await
                .map_err(Self::map_totp_store_error)?;
        }
        Ok(Ok(Some(user_id.to_owned())))
    }

    async fn finish(
        &self,
        outcome: Outcome,
        method: MfaMethod,
        subject: String,
        client: ClientContext,
    ) -> Result<MfaVerified, Error> {
        match outcome {
            Ok(user_id) => {
                self.audit(
                    SecurityEvent::new(SecurityEventKind::MfaVerified, client)
                        .with_subject(subject),
                )
                .await;
                Ok(MfaVerified {
                    method,
                    user_id,
                    verified_at: self.clock.utc(),
                })
            }
            Err(denial) => {
                debug!(reason = denial.as_str(), method = method.as_str(), "MFA rejected");
                self.audit(
                    SecurityEvent::new(SecurityEventKind::MfaVerificationFailed, client)
                        .with_reason(denial.as_str())
                        .with_subject(subject),
                )
                .await;
                Err(Error::forbidden(VERIFICATION_FAILED))
            }
        }
    }
}

#[async_trait]
impl MfaCommand for MfaService {
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeIssued, Error> {
        let target = Self::normalise_target(request.method, &request.target)?;
        self.claim_issuance_slot(&target).await?;
        let code = ChannelCode::generate();
        let expires_at = self.clock.utc() + self.config.code_ttl;
        let record = OneTimeCodeRecord {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            target: target.clone(),
            method: request.method,
            code: code.clone(),
            expires_at,
            failed_attempts: 0,
        };
        self.codes
            .replace_for_target(record)
            .await
            .map_err(Self::map_code_store_error)?;

        let delivery = CodeDelivery {
            target,
            method: request.method,
            code: code.as_str().to_owned(),
        };
        if let Err(err) = self.notifier.send_code(&delivery).await {
            warn!(error = %err, method = request.method.as_str(), "code delivery failed");
        }

        Ok(CodeIssued {
            method: request.method,
            expires_at,
        })
    }

    async fn verify(&self, request: VerifyMfaRequest) -> Result<MfaVerified, Error> {
        let VerifyMfaRequest { challenge, client } = request;
        match challenge {
            MfaChallenge::Channel {
                target,
                method,
                code,
            } => {
                let outcome = self.verify_channel(&target, method, &code).await?;
                let subject = method.normalise_target(&target);
                self.finish(outcome, method.into(), subject, client).await
            }
            MfaChallenge::Totp { user_id, code } => {
                let outcome = self.verify_totp(&user_id, &code).await?;
                self.finish(outcome, MfaMethod::Totp, user_id, client).await
            }
        }
    }

    async fn provision_totp(
        &self,
        request: ProvisionTotpRequest,
    ) -> Result<TotpProvisioning, Error> {
        let user_id = request.user_id.trim();
        let account = request.account_name.trim();
        if user_id.is_empty() || account.is_empty() {
            return Err(Error::invalid_request(
                "userId and accountName are required",
            ));
        }

        let enrollment = self
            .totp_secrets
            .insert_if_absent(user_id, TotpSecret::generate())
            .await
            .map_err(Self::map_totp_store_error)?;
        let uri = provisioning_uri(&enrollment.secret, &self.config.totp_issuer, account)
            .map_err(|err| Error::internal(err.to_string()))?;
        Ok(TotpProvisioning {
            secret: enrollment.secret.as_base32().to_owned(),
            provisioning_uri: uri,
            enrolled: enrollment.enrolled,
        })
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
