//! PaymentRefund entity.
//!
//! One row per refund request against a paid order. `out_request_no` is the
//! idempotency key; the database enforces its uniqueness.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, RefundId, Timestamp};

/// Refund processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Created locally, gateway call in flight.
    Pending,

    /// Gateway accepted the refund.
    Success,

    /// Gateway rejected the refund.
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Success => "success",
            RefundStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RefundStatus::Pending),
            "success" => Some(RefundStatus::Success),
            "failed" => Some(RefundStatus::Failed),
            _ => None,
        }
    }
}

/// A refund request and its gateway outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRefund {
    pub id: RefundId,

    /// The order being refunded.
    pub order_id: PaymentId,

    /// Idempotency key sent to the gateway; globally unique.
    pub out_request_no: String,

    /// Requested refund amount in cents.
    pub refund_amount_cents: i64,

    /// Fee portion reported by the gateway, in cents.
    pub refund_fee_cents: Option<i64>,

    /// Caller-supplied reason forwarded to the gateway.
    pub reason: String,

    pub status: RefundStatus,

    /// Raw gateway refund status string, if reported.
    pub refund_status: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRefund {
    /// Creates a pending refund for an order.
    pub fn new(
        order_id: PaymentId,
        out_request_no: impl Into<String>,
        refund_amount_cents: i64,
        reason: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: RefundId::new(),
            order_id,
            out_request_no: out_request_no.into(),
            refund_amount_cents,
            refund_fee_cents: None,
            reason: reason.into(),
            status: RefundStatus::Pending,
            refund_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the gateway's acceptance.
    pub fn mark_succeeded(&mut self, refund_fee_cents: Option<i64>, refund_status: Option<String>) {
        self.status = RefundStatus::Success;
        self.refund_fee_cents = refund_fee_cents;
        self.refund_status = refund_status;
        self.updated_at = Timestamp::now();
    }

    /// Records the gateway's rejection.
    pub fn mark_failed(&mut self, refund_status: Option<String>) {
        self.status = RefundStatus::Failed;
        self.refund_status = refund_status;
        self.updated_at = Timestamp::now();
    }
}
