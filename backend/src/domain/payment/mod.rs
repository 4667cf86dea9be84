//! Payment gateway reconciliation.

mod event;
mod outcome;
mod service;

pub use event::{
    ASYNC_PAYMENT_FAILED, ASYNC_PAYMENT_SUCCEEDED, CHECKOUT_COMPLETED, DEFAULT_CUSTOMER_NAME,
    GatewayEvent, GatewayEventError, GatewayEventKind,
};
pub use outcome::ReconciliationOutcome;
pub use service::{PaymentPorts, PaymentReconciliationService, ReconciliationConfig};
