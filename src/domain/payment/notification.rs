//! Gateway notification records and wire parsing.
//!
//! Every webhook delivery is persisted as a `GatewayNotification` row
//! *before* signature verification, so no delivery is ever lost, then
//! marched through verify and process status ladders. Rows are append-only
//! once processing reaches a terminal state.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{NotificationId, PaymentId, Timestamp};

use super::signature::url_decode;
use super::{parse_amount, PaymentError};

/// Gateway trade status values carried in webhooks and query responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStatus {
    /// Payment captured; refundable.
    Success,

    /// Payment captured and settled; no longer refundable at the gateway.
    Finished,

    /// Trade closed without (full) payment.
    Closed,

    /// Buyer has not paid yet.
    WaitBuyerPay,

    /// Unrecognized status string, kept verbatim for the audit trail.
    Unknown(String),
}

impl TradeStatus {
    /// Parses a raw wire value, normalizing to uppercase first.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "TRADE_SUCCESS" => TradeStatus::Success,
            "TRADE_FINISHED" => TradeStatus::Finished,
            "TRADE_CLOSED" => TradeStatus::Closed,
            "WAIT_BUYER_PAY" => TradeStatus::WaitBuyerPay,
            other => TradeStatus::Unknown(other.to_string()),
        }
    }

    /// True for statuses that mean the gateway captured the funds.
    pub fn is_paid(&self) -> bool {
        matches!(self, TradeStatus::Success | TradeStatus::Finished)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TradeStatus::Success => "TRADE_SUCCESS",
            TradeStatus::Finished => "TRADE_FINISHED",
            TradeStatus::Closed => "TRADE_CLOSED",
            TradeStatus::WaitBuyerPay => "WAIT_BUYER_PAY",
            TradeStatus::Unknown(s) => s,
        }
    }
}

/// Splits a form-encoded body into raw key/value pairs.
///
/// No decoding happens here: the canonical-string builder needs the pairs
/// exactly as delivered, and decodes itself.
pub fn raw_pairs(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

/// Verification status ladder for a stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Pending,
    Passed,
    Failed,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyStatus::Pending => "pending",
            VerifyStatus::Passed => "passed",
            VerifyStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerifyStatus::Pending),
            "passed" => Some(VerifyStatus::Passed),
            "failed" => Some(VerifyStatus::Failed),
            _ => None,
        }
    }
}

/// Processing status ladder for a stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Success,
    Failed,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Success => "success",
            ProcessStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessStatus::Pending),
            "success" => Some(ProcessStatus::Success),
            "failed" => Some(ProcessStatus::Failed),
            _ => None,
        }
    }
}

/// Durable audit record of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub id: NotificationId,

    /// Linked once the order is located; the row is created before the
    /// order is known.
    pub order_id: Option<PaymentId>,

    /// Provider's notification id, if present in the payload.
    pub notify_id: Option<String>,

    /// Provider's notification type, if present in the payload.
    pub notify_type: Option<String>,

    /// The body exactly as delivered.
    pub raw_body: String,

    /// Signature fields extracted from the body.
    pub sign: Option<String>,
    pub sign_type: Option<String>,

    pub verify_status: VerifyStatus,
    pub process_status: ProcessStatus,

    /// Error detail when verification or processing failed.
    pub error_message: Option<String>,

    /// When processing reached a terminal state.
    pub processed_at: Option<Timestamp>,

    pub created_at: Timestamp,
}

impl GatewayNotification {
    /// Records a freshly received delivery, before any verification.
    pub fn received(raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let pairs = raw_pairs(&raw_body);
        let field = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| url_decode(value))
        };

        Self {
            id: NotificationId::new(),
            order_id: None,
            notify_id: field("notify_id"),
            notify_type: field("notify_type"),
            sign: field("sign"),
            sign_type: field("sign_type"),
            raw_body,
            verify_status: VerifyStatus::Pending,
            process_status: ProcessStatus::Pending,
            error_message: None,
            processed_at: None,
            created_at: Timestamp::now(),
        }
    }

    /// Raw key/value pairs of the stored body.
    pub fn pairs(&self) -> Vec<(String, String)> {
        raw_pairs(&self.raw_body)
    }

    pub fn mark_verified(&mut self) {
        self.verify_status = VerifyStatus::Passed;
    }

    /// Marks verification failure; processing stays PENDING and the order
    /// is never touched for this delivery.
    pub fn mark_verify_failed(&mut self, reason: impl Into<String>) {
        self.verify_status = VerifyStatus::Failed;
        self.error_message = Some(reason.into());
    }

    /// Marks processing success. No-op once terminal.
    pub fn mark_processed(&mut self) {
        if self.process_status.is_terminal() {
            return;
        }
        self.process_status = ProcessStatus::Success;
        self.processed_at = Some(Timestamp::now());
    }

    /// Marks processing failure with detail. No-op once terminal.
    pub fn mark_process_failed(&mut self, reason: impl Into<String>) {
        if self.process_status.is_terminal() {
            return;
        }
        self.process_status = ProcessStatus::Failed;
        self.error_message = Some(reason.into());
        self.processed_at = Some(Timestamp::now());
    }

    pub fn link_order(&mut self, order_id: PaymentId) {
        self.order_id = Some(order_id);
    }
}

/// The fields a notification must carry to drive an order transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFields {
    pub out_trade_no: String,
    pub trade_status: TradeStatus,
    pub trade_no: Option<String>,
    pub buyer_id: Option<String>,
    pub buyer_logon_id: Option<String>,
    pub receipt_amount_cents: Option<i64>,
    pub pay_time: Option<Timestamp>,
}

impl NotificationFields {
    /// Extracts and decodes the required fields from raw pairs.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Validation` when `out_trade_no` or
    /// `trade_status` is missing, or `receipt_amount` is malformed.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, PaymentError> {
        let field = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| url_decode(value))
                .filter(|value| !value.is_empty())
        };

        let out_trade_no = field("out_trade_no")
            .ok_or_else(|| PaymentError::validation("out_trade_no", "missing from notification"))?;
        let trade_status_raw = field("trade_status")
            .ok_or_else(|| PaymentError::validation("trade_status", "missing from notification"))?;

        let receipt_amount_cents = match field("receipt_amount") {
            Some(raw) => Some(parse_amount(&raw)?),
            None => None,
        };

        Ok(Self {
            out_trade_no,
            trade_status: TradeStatus::parse(&trade_status_raw),
            trade_no: field("trade_no"),
            buyer_id: field("buyer_id"),
            buyer_logon_id: field("buyer_logon_id"),
            receipt_amount_cents,
            pay_time: field("gmt_payment").and_then(|raw| Timestamp::parse_wire_format(&raw)),
        })
    }
}
