//! Payment-specific error types.
//!
//! The taxonomy separates caller mistakes (validation, not-found) from
//! provider rejections (gateway), protocol failures (signature) and the two
//! failure classes that need operational follow-up: persistence failures
//! after an irreversible gateway-side effect, and lost compare-and-swap
//! races.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation / MembershipDowngrade / RefundExceedsOrder | 400 |
//! | SignatureVerification | 401 |
//! | Forbidden | 403 |
//! | OrderNotFound / PlanNotFound | 404 |
//! | PendingOrderExists / DuplicateRefundRequest / Conflict | 409 |
//! | InvalidOrderState | 409 |
//! | Gateway | 502 |
//! | Persistence / ActivationFailed | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, PlanId, UserId};

use super::signature::SignatureError;

/// Errors raised by payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Bad input, rejected before any persistence.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// A user may only have one in-flight commercial transaction.
    #[error("User {user_id} already has a pending order")]
    PendingOrderExists { user_id: UserId },

    /// Buying a plan below the user's current active level is rejected up front.
    #[error("Plan '{plan}' is below the active membership level {current_level}")]
    MembershipDowngrade { plan: String, current_level: u8 },

    /// Order could not be located.
    #[error("Order {order_ref} not found")]
    OrderNotFound { order_ref: String },

    /// Membership plan could not be located.
    #[error("Membership plan {plan_id} not found")]
    PlanNotFound { plan_id: PlanId },

    /// The requesting user does not own the order.
    #[error("Order {order_ref} does not belong to the requesting user")]
    Forbidden { order_ref: String },

    /// The order is not in a state that permits the operation.
    #[error("Order {order_ref} is {status}, operation requires {required}")]
    InvalidOrderState {
        order_ref: String,
        status: String,
        required: String,
    },

    /// Refund idempotency key was already used.
    #[error("Duplicate refund request '{out_request_no}'")]
    DuplicateRefundRequest { out_request_no: String },

    /// Refund amount exceeds what the order captured.
    #[error("Refund amount {requested} exceeds order amount {available}")]
    RefundExceedsOrder { requested: i64, available: i64 },

    /// Provider returned a non-success code or the call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Key handling or signing failed.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Inbound payload failed signature verification. Fatal for that
    /// payload; retrying the identical bytes cannot succeed.
    #[error("Webhook signature verification failed")]
    SignatureVerification,

    /// Local write failed after an irreversible gateway-side effect.
    /// Logged as a reconciliation gap, not rolled back.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A compare-and-swap guard lost the race; re-read state and retry.
    #[error("Concurrent modification detected: {0}")]
    Conflict(String),

    /// The order is paid but the entitlement could not be activated.
    /// Surfaced distinctly for out-of-band repair.
    #[error("Entitlement activation failed for order {order_ref}: {message}")]
    ActivationFailed { order_ref: String, message: String },
}

impl PaymentError {
    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(
        order_ref: impl Into<String>,
        status: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        PaymentError::InvalidOrderState {
            order_ref: order_ref.into(),
            status: status.into(),
            required: required.into(),
        }
    }

    pub fn order_not_found(order_ref: impl Into<String>) -> Self {
        PaymentError::OrderNotFound {
            order_ref: order_ref.into(),
        }
    }

    /// True when a retry with the same input could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::OrderNotFound { .. }
                | PaymentError::Persistence(_)
                | PaymentError::Conflict(_)
                | PaymentError::Gateway(GatewayError::Network(_))
                | PaymentError::Gateway(GatewayError::Timeout)
        )
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::OrderNotFound => PaymentError::OrderNotFound {
                order_ref: err.message,
            },
            ErrorCode::DuplicateKey | ErrorCode::ConcurrencyConflict => {
                PaymentError::Conflict(err.to_string())
            }
            _ => PaymentError::Persistence(err.to_string()),
        }
    }
}

/// Errors from the payment gateway.
///
/// `Api` carries the provider's code/sub_code so callers can classify the
/// rejection (permission problems, unknown trades) without string matching
/// on messages.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The provider answered with a non-success code.
    #[error("Gateway error {code}: {message}")]
    Api {
        code: String,
        sub_code: Option<String>,
        message: String,
    },

    /// The HTTP call itself failed.
    #[error("Gateway request failed: {0}")]
    Network(String),

    /// The fixed client-side timeout elapsed. The order stays PENDING;
    /// only a trade query resolves the true outcome.
    #[error("Gateway request timed out")]
    Timeout,

    /// The response body did not match the expected envelope shape.
    #[error("Gateway response malformed: {0}")]
    Protocol(String),

    /// Building or signing the outbound request failed.
    #[error(transparent)]
    Signing(#[from] SignatureError),
}

impl GatewayError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Api {
            code: code.into(),
            sub_code: None,
            message: message.into(),
        }
    }

    pub fn with_sub_code(self, sub_code: impl Into<String>) -> Self {
        match self {
            GatewayError::Api { code, message, .. } => GatewayError::Api {
                code,
                sub_code: Some(sub_code.into()),
                message,
            },
            other => other,
        }
    }

    /// Provider-side permission problems get a remediation hint instead of
    /// an opaque code.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            GatewayError::Api {
                sub_code: Some(sub),
                ..
            } => sub.starts_with("isv.") || sub.contains("insufficient-permissions"),
            _ => false,
        }
    }

    /// The provider has no record of the trade yet. Expected while the
    /// buyer has not opened the payment page; not a hard failure.
    pub fn is_trade_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::Api { sub_code: Some(sub), .. } if sub == "ACQ.TRADE_NOT_EXIST"
        )
    }

    pub fn remediation_hint(&self) -> Option<&'static str> {
        if self.is_permission_denied() {
            Some("verify the application's API permissions and signing key registration with the provider")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_sub_codes_are_classified() {
        let err = GatewayError::api("40006", "Insufficient Permissions")
            .with_sub_code("isv.insufficient-isv-permissions");
        assert!(err.is_permission_denied());
        assert!(err.remediation_hint().is_some());
    }

    #[test]
    fn ordinary_api_errors_have_no_hint() {
        let err = GatewayError::api("40004", "Business Failed").with_sub_code("ACQ.SELLER_BALANCE_NOT_ENOUGH");
        assert!(!err.is_permission_denied());
        assert!(err.remediation_hint().is_none());
    }

    #[test]
    fn trade_not_exist_is_recognized() {
        let err = GatewayError::api("40004", "Business Failed").with_sub_code("ACQ.TRADE_NOT_EXIST");
        assert!(err.is_trade_not_found());
    }

    #[test]
    fn timeout_is_retryable_through_payment_error() {
        let err: PaymentError = GatewayError::Timeout.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn signature_verification_is_not_retryable() {
        assert!(!PaymentError::SignatureVerification.is_retryable());
    }

    #[test]
    fn domain_not_found_maps_to_order_not_found() {
        let err: PaymentError =
            DomainError::new(ErrorCode::OrderNotFound, "order xyz").into();
        assert!(matches!(err, PaymentError::OrderNotFound { .. }));
    }

    #[test]
    fn domain_duplicate_maps_to_conflict() {
        let err: PaymentError = DomainError::duplicate("out_trade_no taken").into();
        assert!(matches!(err, PaymentError::Conflict(_)));
    }
}
