//! PaymentGateway port - The external payment provider.
//!
//! One canonical gateway protocol shape: signed form-encoded requests, a
//! `*_response` JSON envelope, trade statuses shared with the webhook
//! channel. Implementations own the signing and wire framing.

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{GatewayError, TradeStatus};

/// Request to start the browser payment flow for an order.
#[derive(Debug, Clone)]
pub struct PagePayRequest {
    pub out_trade_no: String,
    pub amount_cents: i64,
    pub subject: String,
    pub product_code: String,
}

/// The provider's view of a trade, from a query call.
#[derive(Debug, Clone)]
pub struct TradeState {
    pub trade_status: TradeStatus,
    pub trade_no: Option<String>,
    pub buyer_id: Option<String>,
    pub buyer_logon_id: Option<String>,
    pub receipt_amount_cents: Option<i64>,
    pub pay_time: Option<Timestamp>,
}

/// Refund instruction for a captured trade.
#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub out_trade_no: String,
    pub out_request_no: String,
    pub refund_amount_cents: i64,
    pub reason: String,
}

/// The provider's answer to a refund call.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    /// Fee portion of the refund, when reported.
    pub refund_fee_cents: Option<i64>,

    /// Raw provider refund status string, when reported.
    pub refund_status: Option<String>,
}

/// Port for the external payment provider.
///
/// All calls block the handling task up to the client's fixed timeout; a
/// timeout never implies failure of the remote effect (query to resolve).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Builds the signed browser redirect URL for the payment page.
    ///
    /// No server-to-server call is made; failure means signing failed.
    fn build_pay_url(&self, request: &PagePayRequest) -> Result<String, GatewayError>;

    /// Queries the provider's state of a trade.
    async fn query_trade(&self, out_trade_no: &str) -> Result<TradeState, GatewayError>;

    /// Closes an unpaid trade at the provider.
    async fn close_trade(&self, out_trade_no: &str) -> Result<(), GatewayError>;

    /// Cancels a trade at the provider.
    async fn cancel_trade(&self, out_trade_no: &str) -> Result<(), GatewayError>;

    /// Refunds (part of) a captured trade.
    async fn refund_trade(&self, command: &RefundCommand) -> Result<RefundOutcome, GatewayError>;
}
