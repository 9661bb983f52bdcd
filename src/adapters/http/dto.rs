//! Request/response DTOs for the payment HTTP API.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payment::{PaymentError, PaymentOrder};

/// Request body for order creation.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub amount_cents: i64,
    pub subject: String,
    /// Membership plan being purchased, if any.
    pub plan_id: Option<Uuid>,
}

/// Request body for refunds.
#[derive(Debug, Deserialize)]
pub struct RefundOrderRequest {
    pub refund_amount_cents: i64,
    pub reason: String,
    /// Idempotency key; generated when absent.
    pub out_request_no: Option<String>,
}

/// Response for order creation.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub order_sn: String,
    pub out_trade_no: String,
    pub pay_url: String,
}

/// Response for payment retries.
#[derive(Debug, Serialize)]
pub struct RepayOrderResponse {
    pub order_id: Uuid,
    pub payment_no: String,
    pub pay_url: String,
}

/// Response for cancel/close operations.
#[derive(Debug, Serialize)]
pub struct SettleOrderResponse {
    pub order_id: Uuid,
    pub local_status_updated: bool,
}

/// Response for refunds.
#[derive(Debug, Serialize)]
pub struct RefundOrderResponse {
    pub refund_id: Uuid,
    pub out_request_no: String,
    pub order_status: String,
}

/// The client-facing view of an order.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub order_sn: String,
    pub out_trade_no: String,
    pub status: String,
    pub amount_cents: i64,
    pub subject: String,
    pub trade_no: Option<String>,
    pub pay_time: Option<String>,
    pub created_at: String,
}

impl From<&PaymentOrder> for OrderResponse {
    fn from(order: &PaymentOrder) -> Self {
        Self {
            order_id: *order.id.as_uuid(),
            order_sn: order.order_sn.clone(),
            out_trade_no: order.out_trade_no.clone(),
            status: order.status.as_str().to_string(),
            amount_cents: order.amount_cents,
            subject: order.subject.clone(),
            trade_no: order.trade_no.clone(),
            pay_time: order.pay_time.map(|t| t.to_wire_format()),
            created_at: order.created_at.to_wire_format(),
        }
    }
}

/// Standard error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Maps a payment error to its HTTP status and response body.
pub fn error_to_response(error: &PaymentError) -> (StatusCode, ErrorResponse) {
    use PaymentError::*;

    let (status, code) = match error {
        Validation { .. } | MembershipDowngrade { .. } | RefundExceedsOrder { .. } => {
            (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
        }
        SignatureVerification | Signature(_) => (StatusCode::UNAUTHORIZED, "SIGNATURE_INVALID"),
        Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        OrderNotFound { .. } => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        PlanNotFound { .. } => (StatusCode::NOT_FOUND, "PLAN_NOT_FOUND"),
        PendingOrderExists { .. } => (StatusCode::CONFLICT, "PENDING_ORDER_EXISTS"),
        DuplicateRefundRequest { .. } => (StatusCode::CONFLICT, "DUPLICATE_REFUND_REQUEST"),
        InvalidOrderState { .. } | Conflict(_) => (StatusCode::CONFLICT, "INVALID_ORDER_STATE"),
        Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
        Persistence(_) | ActivationFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    (status, ErrorResponse::new(code, error.to_string()))
}
