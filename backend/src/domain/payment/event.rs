//! Payment gateway webhook events as a closed set of variants.

use serde::Deserialize;

use crate::domain::envelope::PaymentStatus;

/// `checkout.session.completed`
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// `checkout.session.async_payment_succeeded`
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
/// `checkout.session.async_payment_failed`
pub const ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";

/// Name used in provisioning notices when the gateway omits one.
pub const DEFAULT_CUSTOMER_NAME: &str = "Client";

/// Failure decoding a webhook body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayEventError {
    /// Body is not JSON of the expected shape.
    #[error("malformed gateway event: {message}")]
    Malformed { message: String },
    /// The event id is blank.
    #[error("gateway event has no id")]
    MissingId,
}

/// What the gateway reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    /// Checkout finished; `settled` when funds are already captured.
    CheckoutCompleted {
        /// `payment_status == "paid"` on the session.
        settled: bool,
    },
    /// Delayed settlement succeeded.
    AsyncPaymentSucceeded,
    /// Delayed settlement failed.
    AsyncPaymentFailed,
    /// Any other event type; acknowledged without effect.
    Unknown {
        /// Raw `type` field.
        event_type: String,
    },
}

impl GatewayEventKind {
    /// Payment status this event asks for, or `None` for unknown events.
    #[must_use]
    pub const fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::CheckoutCompleted { settled: true } | Self::AsyncPaymentSucceeded => {
                Some(PaymentStatus::Paid)
            }
            Self::CheckoutCompleted { settled: false } => Some(PaymentStatus::WaitingForPayment),
            Self::AsyncPaymentFailed => Some(PaymentStatus::PaymentFailed),
            Self::Unknown { .. } => None,
        }
    }

    /// Gateway event type name.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted { .. } => CHECKOUT_COMPLETED,
            Self::AsyncPaymentSucceeded => ASYNC_PAYMENT_SUCCEEDED,
            Self::AsyncPaymentFailed => ASYNC_PAYMENT_FAILED,
            Self::Unknown { event_type } => event_type,
        }
    }
}

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    /// Gateway-assigned event id, used for de-duplication.
    pub id: String,
    /// Event variant.
    pub kind: GatewayEventKind,
    /// Envelope id carried as the session's client reference.
    pub correlation_id: Option<String>,
    /// Customer email for the provisioning notice.
    pub customer_email: Option<String>,
    /// Customer display name.
    pub customer_name: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: RawData,
}

#[derive(Default, Deserialize)]
struct RawData {
    #[serde(default)]
    object: RawSession,
}

#[derive(Default, Deserialize)]
struct RawSession {
    client_reference_id: Option<String>,
    payment_status: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<RawCustomerDetails>,
}

#[derive(Default, Deserialize)]
struct RawCustomerDetails {
    name: Option<String>,
    email: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl GatewayEvent {
    /// Decode a raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, GatewayEventError> {
        let raw: RawEvent =
            serde_json::from_slice(body).map_err(|err| GatewayEventError::Malformed {
                message: err.to_string(),
            })?;
        let id = raw.id.trim().to_owned();
        if id.is_empty() {
            return Err(GatewayEventError::MissingId);
        }

        let session = raw.data.object;
        let kind = match raw.event_type.as_str() {
            CHECKOUT_COMPLETED => GatewayEventKind::CheckoutCompleted {
                settled: session.payment_status.as_deref() == Some("paid"),
            },
            ASYNC_PAYMENT_SUCCEEDED => GatewayEventKind::AsyncPaymentSucceeded,
            ASYNC_PAYMENT_FAILED => GatewayEventKind::AsyncPaymentFailed,
            _ => GatewayEventKind::Unknown {
                event_type: raw.event_type,
            },
        };
        let (details_name, details_email) = session
            .customer_details
            .map_or((None, None), |details| (details.name, details.email));

        Ok(Self {
            id,
            kind,
            correlation_id: non_blank(session.client_reference_id),
            customer_email: non_blank(session.customer_email).or_else(|| non_blank(details_email)),
            customer_name: non_blank(details_name),
        })
    }

    /// Customer name, or [`DEFAULT_CUSTOMER_NAME`].
    #[must_use]
    pub fn customer_name_or_default(&self) -> &str {
        self.customer_name.as_deref().unwrap_or(DEFAULT_CUSTOMER_NAME)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn body(event_type: &str, payment_status: &str) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": {
                "client_reference_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
                "payment_status": payment_status,
                "customer_email": "ada@example.com",
                "customer_details": { "name": "Ada" }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[rstest]
    #[case(CHECKOUT_COMPLETED, "paid", Some(PaymentStatus::Paid))]
    #[case(CHECKOUT_COMPLETED, "unpaid", Some(PaymentStatus::WaitingForPayment))]
    #[case(ASYNC_PAYMENT_SUCCEEDED, "paid", Some(PaymentStatus::Paid))]
    #[case(ASYNC_PAYMENT_FAILED, "unpaid", Some(PaymentStatus::PaymentFailed))]
    #[case("invoice.created", "paid", None)]
    fn maps_event_types(
        #[case] event_type: &str,
        #[case] payment_status: &str,
        #[case] expected: Option<PaymentStatus>,
    ) {
        let event = GatewayEvent::from_slice(&body(event_type, payment_status)).expect("decodes");
        assert_eq!(event.kind.target_status(), expected);
        assert_eq!(event.kind.event_type(), event_type);
    }

    #[rstest]
    fn extracts_correlation_and_customer() {
        let event = GatewayEvent::from_slice(&body(CHECKOUT_COMPLETED, "paid")).expect("decodes");
        assert_eq!(event.id, "evt_1");
        assert_eq!(
            event.correlation_id.as_deref(),
            Some("3fa85f64-5717-4562-b3fc-2c963f66afa6")
        );
        assert_eq!(event.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(event.customer_name_or_default(), "Ada");
    }

    #[rstest]
    fn tolerates_missing_session_fields() {
        let raw = json!({ "id": "evt_2", "type": ASYNC_PAYMENT_SUCCEEDED, "data": { "object": {
            "client_reference_id": "  ",
            "customer_details": { "email": "b@example.com" }
        }}});
        let event = GatewayEvent::from_slice(raw.to_string().as_bytes()).expect("decodes");
        assert_eq!(event.correlation_id, None);
        assert_eq!(event.customer_email.as_deref(), Some("b@example.com"));
        assert_eq!(event.customer_name_or_default(), DEFAULT_CUSTOMER_NAME);
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(br#"{"id":"evt_3"}"#.as_slice())]
    fn rejects_malformed_bodies(#[case] raw: &[u8]) {
        assert!(matches!(
            GatewayEvent::from_slice(raw),
            Err(GatewayEventError::Malformed { .. })
        ));
    }

    #[rstest]
    fn rejects_missing_event_id() {
        let raw = json!({ "type": CHECKOUT_COMPLETED, "data": { "object": {} } });
        assert_eq!(
            GatewayEvent::from_slice(raw.to_string().as_bytes()),
            Err(GatewayEventError::MissingId)
        );
    }
}
