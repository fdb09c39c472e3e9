//! Domain models for the payment lifecycle engine.

pub mod gateway_log;
pub mod idempotency;
pub mod ids;
pub mod money;
pub mod payment;

pub use gateway_log::{GatewayLogEntry, GatewayOperation, GatewayOutcome};
pub use idempotency::{IdempotencyRecord, StoredOutcome, request_fingerprint};
pub use ids::{CaptureId, ParseIdError, PaymentId, RefundId};
pub use money::{Currency, Money};
pub use payment::{Capture, Payment, PaymentMethod, PaymentStatus, Refund};
