//! PaymentOrder aggregate and its lifecycle state machine.
//!
//! # Invariants
//!
//! - `out_trade_no` is globally unique (database constraint)
//! - Status only moves forward: `PENDING -> PAID -> {REFUNDED |
//!   PARTIAL_REFUNDED}`, `PENDING -> CLOSED`, `PENDING -> CANCELLED`
//! - Orders are soft-deleted only, never removed
//! - Money is i64 cents

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, PlanId, StateMachine, Timestamp, UserId};

use super::PaymentError;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created locally, awaiting payment at the gateway.
    Pending,

    /// Gateway captured the funds.
    Paid,

    /// Closed before payment (timeout or merchant action).
    Closed,

    /// Cancelled before payment by the buyer or merchant.
    Cancelled,

    /// Fully refunded.
    Refunded,

    /// Partially refunded.
    PartialRefunded,
}

impl OrderStatus {
    /// True once the order no longer awaits payment. A settled order never
    /// triggers another gateway query.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Closed => "closed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::PartialRefunded => "partial_refunded",
        }
    }

    /// Parses the database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "closed" => Some(OrderStatus::Closed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            "partial_refunded" => Some(OrderStatus::PartialRefunded),
            _ => None,
        }
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Paid)
                | (Pending, Closed)
                | (Pending, Cancelled)
                | (Paid, Refunded)
                | (Paid, PartialRefunded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Pending => vec![Paid, Closed, Cancelled],
            Paid => vec![Refunded, PartialRefunded],
            Closed | Cancelled | Refunded | PartialRefunded => vec![],
        }
    }
}

/// Fields captured from the gateway when an order is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidFields {
    /// The gateway's own trade number.
    pub trade_no: String,

    /// Raw gateway trade status string that triggered the transition.
    pub trade_status: String,

    /// Buyer account id at the gateway.
    pub buyer_id: Option<String>,

    /// Buyer login name at the gateway.
    pub buyer_logon_id: Option<String>,

    /// Amount the gateway actually captured, in cents.
    pub receipt_amount_cents: Option<i64>,

    /// When the gateway recorded the payment.
    pub pay_time: Option<Timestamp>,
}

/// PaymentOrder aggregate - one commercial transaction against the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Immutable row identity; the order reference used by the API.
    pub id: PaymentId,

    /// Business payment-attempt number. Regenerated on repay; the gateway
    /// transaction identity stays `out_trade_no`.
    pub payment_no: String,

    /// Business order serial shown to the user.
    pub order_sn: String,

    /// Merchant-assigned unique trade number sent to the gateway.
    pub out_trade_no: String,

    /// Owning user.
    pub user_id: UserId,

    /// Order amount in cents.
    pub amount_cents: i64,

    /// Order subject line.
    pub subject: String,

    /// Membership plan this order purchases, if any.
    pub plan_id: Option<PlanId>,

    /// Gateway product code used for this order.
    pub product_code: String,

    /// Lifecycle status.
    pub status: OrderStatus,

    /// Gateway's trade number, known once paid.
    pub trade_no: Option<String>,

    /// Last raw gateway trade status observed.
    pub trade_status: Option<String>,

    pub buyer_id: Option<String>,
    pub buyer_logon_id: Option<String>,

    /// Amount the gateway captured, in cents.
    pub receipt_amount_cents: Option<i64>,

    /// When the gateway recorded the payment.
    pub pay_time: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Soft-delete marker. Lifecycle status is never affected by deletion.
    pub deleted_at: Option<Timestamp>,
}

impl PaymentOrder {
    /// Creates a new PENDING order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Validation` when amount is not positive or
    /// the subject is empty.
    pub fn new(
        user_id: UserId,
        amount_cents: i64,
        subject: impl Into<String>,
        plan_id: Option<PlanId>,
        product_code: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let subject = subject.into();
        if amount_cents <= 0 {
            return Err(PaymentError::validation(
                "amount",
                format!("must be positive, got {}", amount_cents),
            ));
        }
        if subject.trim().is_empty() {
            return Err(PaymentError::validation("subject", "must not be empty"));
        }

        let now = Timestamp::now();
        Ok(Self {
            id: PaymentId::new(),
            payment_no: generate_payment_no(),
            order_sn: generate_serial(now, "SN"),
            out_trade_no: generate_serial(now, ""),
            user_id,
            amount_cents,
            subject,
            plan_id,
            product_code: product_code.into(),
            status: OrderStatus::Pending,
            trade_no: None,
            trade_status: None,
            buyer_id: None,
            buyer_logon_id: None,
            receipt_amount_cents: None,
            pay_time: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Starts a new payment attempt for the same transaction.
    ///
    /// Keeps `out_trade_no` and amount; only the attempt number changes.
    ///
    /// # Errors
    ///
    /// Only PENDING orders can be retried.
    pub fn begin_repay(&mut self) -> Result<(), PaymentError> {
        self.require_status(OrderStatus::Pending, "repay")?;
        self.payment_no = generate_payment_no();
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Applies the gateway-confirmed payment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrderState` unless the order is PENDING. Callers
    /// that need race safety must go through the repository CAS instead.
    pub fn mark_paid(&mut self, fields: PaidFields) -> Result<(), PaymentError> {
        self.require_status(OrderStatus::Pending, "mark paid")?;
        self.status = OrderStatus::Paid;
        self.trade_no = Some(fields.trade_no);
        self.trade_status = Some(fields.trade_status);
        self.buyer_id = fields.buyer_id;
        self.buyer_logon_id = fields.buyer_logon_id;
        self.receipt_amount_cents = fields.receipt_amount_cents;
        self.pay_time = fields.pay_time;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Closes a PENDING order.
    pub fn close(&mut self) -> Result<(), PaymentError> {
        self.require_status(OrderStatus::Pending, "close")?;
        self.status = OrderStatus::Closed;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Cancels a PENDING order.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.require_status(OrderStatus::Pending, "cancel")?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Applies a refund of `amount_cents`.
    ///
    /// Full refunds transition to REFUNDED, anything less to
    /// PARTIAL_REFUNDED.
    ///
    /// # Errors
    ///
    /// Requires PAID status and `amount_cents <= self.amount_cents`.
    pub fn apply_refund(&mut self, amount_cents: i64) -> Result<(), PaymentError> {
        self.require_status(OrderStatus::Paid, "refund")?;
        if amount_cents <= 0 {
            return Err(PaymentError::validation(
                "refund_amount",
                format!("must be positive, got {}", amount_cents),
            ));
        }
        if amount_cents > self.amount_cents {
            return Err(PaymentError::RefundExceedsOrder {
                requested: amount_cents,
                available: self.amount_cents,
            });
        }

        self.status = if amount_cents == self.amount_cents {
            OrderStatus::Refunded
        } else {
            OrderStatus::PartialRefunded
        };
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Marks the order deleted without touching lifecycle status.
    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.updated_at = now;
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when the order still awaits resolution past the given cutoff.
    pub fn is_stale_pending(&self, cutoff: Timestamp) -> bool {
        self.status == OrderStatus::Pending && self.created_at.is_before(&cutoff)
    }

    fn require_status(&self, required: OrderStatus, action: &str) -> Result<(), PaymentError> {
        if self.status != required {
            return Err(PaymentError::invalid_state(
                self.id.to_string(),
                format!("{} ({})", self.status.as_str(), action),
                required.as_str(),
            ));
        }
        Ok(())
    }
}

/// Business serial: wire timestamp plus a random numeric suffix.
///
/// Uniqueness is ultimately guaranteed by the database constraint; the
/// random suffix keeps collisions out of the normal path.
fn generate_serial(now: Timestamp, prefix: &str) -> String {
    let stamp = now.as_datetime().format("%Y%m%d%H%M%S%3f");
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{}{:06}", prefix, stamp, suffix)
}

fn generate_payment_no() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> PaymentOrder {
        PaymentOrder::new(UserId::new(), 8800, "Annual Plan", None, "QUICK_WAP_PAY").unwrap()
    }

    fn paid_fields() -> PaidFields {
        PaidFields {
            trade_no: "2024060122001".to_string(),
            trade_status: "TRADE_SUCCESS".to_string(),
            buyer_id: Some("208812".to_string()),
            buyer_logon_id: Some("buy***@example.com".to_string()),
            receipt_amount_cents: Some(8800),
            pay_time: Some(Timestamp::now()),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // State Machine Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn pending_can_be_paid_closed_or_cancelled() {
        let s = OrderStatus::Pending;
        assert!(s.can_transition_to(&OrderStatus::Paid));
        assert!(s.can_transition_to(&OrderStatus::Closed));
        assert!(s.can_transition_to(&OrderStatus::Cancelled));
        assert!(!s.can_transition_to(&OrderStatus::Refunded));
    }

    #[test]
    fn paid_can_only_move_to_refund_states() {
        let s = OrderStatus::Paid;
        assert!(s.can_transition_to(&OrderStatus::Refunded));
        assert!(s.can_transition_to(&OrderStatus::PartialRefunded));
        assert!(!s.can_transition_to(&OrderStatus::Pending));
        assert!(!s.can_transition_to(&OrderStatus::Closed));
    }

    #[test]
    fn closed_cancelled_and_refund_states_are_terminal() {
        assert!(OrderStatus::Closed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(OrderStatus::PartialRefunded.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn every_status_except_pending_is_settled() {
        assert!(!OrderStatus::Pending.is_settled());
        for s in [
            OrderStatus::Paid,
            OrderStatus::Closed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::PartialRefunded,
        ] {
            assert!(s.is_settled());
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Closed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::PartialRefunded,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("bogus"), None);
    }

    // ══════════════════════════════════════════════════════════════
    // Aggregate Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn new_order_starts_pending() {
        let o = order();
        assert_eq!(o.status, OrderStatus::Pending);
        assert!(!o.is_deleted());
        assert!(o.out_trade_no.len() > 17);
    }

    #[test]
    fn new_order_rejects_non_positive_amount() {
        assert!(PaymentOrder::new(UserId::new(), 0, "x", None, "PC").is_err());
        assert!(PaymentOrder::new(UserId::new(), -100, "x", None, "PC").is_err());
    }

    #[test]
    fn new_order_rejects_blank_subject() {
        assert!(PaymentOrder::new(UserId::new(), 100, "  ", None, "PC").is_err());
    }

    #[test]
    fn out_trade_nos_do_not_collide_in_practice() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let o = order();
            assert!(seen.insert(o.out_trade_no), "duplicate out_trade_no");
        }
    }

    #[test]
    fn repay_regenerates_payment_no_but_keeps_out_trade_no() {
        let mut o = order();
        let original_otn = o.out_trade_no.clone();
        let original_pn = o.payment_no.clone();

        o.begin_repay().unwrap();

        assert_eq!(o.out_trade_no, original_otn);
        assert_ne!(o.payment_no, original_pn);
    }

    #[test]
    fn repay_requires_pending() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        assert!(matches!(
            o.begin_repay(),
            Err(PaymentError::InvalidOrderState { .. })
        ));
    }

    #[test]
    fn mark_paid_captures_gateway_fields() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();

        assert_eq!(o.status, OrderStatus::Paid);
        assert_eq!(o.trade_no.as_deref(), Some("2024060122001"));
        assert_eq!(o.receipt_amount_cents, Some(8800));
        assert!(o.pay_time.is_some());
    }

    #[test]
    fn mark_paid_twice_fails() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        assert!(o.mark_paid(paid_fields()).is_err());
    }

    #[test]
    fn cancel_rejected_on_paid_order() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        assert!(matches!(
            o.cancel(),
            Err(PaymentError::InvalidOrderState { .. })
        ));
    }

    #[test]
    fn close_rejected_on_cancelled_order() {
        let mut o = order();
        o.cancel().unwrap();
        assert!(o.close().is_err());
    }

    #[test]
    fn full_refund_transitions_to_refunded() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        o.apply_refund(8800).unwrap();
        assert_eq!(o.status, OrderStatus::Refunded);
    }

    #[test]
    fn partial_refund_transitions_to_partial_refunded() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        o.apply_refund(100).unwrap();
        assert_eq!(o.status, OrderStatus::PartialRefunded);
    }

    #[test]
    fn refund_above_amount_is_rejected() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        assert!(matches!(
            o.apply_refund(8801),
            Err(PaymentError::RefundExceedsOrder { .. })
        ));
        assert_eq!(o.status, OrderStatus::Paid);
    }

    #[test]
    fn refund_requires_paid_status() {
        let mut o = order();
        assert!(o.apply_refund(100).is_err());
    }

    #[test]
    fn soft_delete_keeps_lifecycle_status() {
        let mut o = order();
        o.mark_paid(paid_fields()).unwrap();
        o.soft_delete(Timestamp::now());

        assert!(o.is_deleted());
        assert_eq!(o.status, OrderStatus::Paid);
    }

    proptest::proptest! {
        /// A refund never succeeds above the order amount, and the status
        /// after a valid refund reflects whether it was full or partial.
        #[test]
        fn refund_bound_holds_for_all_amounts(amount in 1i64..=1_000_000, refund in -1_000i64..=2_000_000) {
            let mut o = PaymentOrder::new(UserId::new(), amount, "x", None, "PC").unwrap();
            o.mark_paid(PaidFields {
                trade_no: "T".to_string(),
                trade_status: "TRADE_SUCCESS".to_string(),
                buyer_id: None,
                buyer_logon_id: None,
                receipt_amount_cents: Some(amount),
                pay_time: None,
            }).unwrap();

            let result = o.apply_refund(refund);
            if refund <= 0 || refund > amount {
                proptest::prop_assert!(result.is_err());
                proptest::prop_assert_eq!(o.status, OrderStatus::Paid);
            } else if refund == amount {
                proptest::prop_assert!(result.is_ok());
                proptest::prop_assert_eq!(o.status, OrderStatus::Refunded);
            } else {
                proptest::prop_assert!(result.is_ok());
                proptest::prop_assert_eq!(o.status, OrderStatus::PartialRefunded);
            }
        }
    }

    #[test]
    fn stale_pending_is_detected_by_cutoff() {
        let mut o = order();
        let future_cutoff = Timestamp::now().add_days(1);
        assert!(o.is_stale_pending(future_cutoff));

        let past_cutoff = Timestamp::now().minus_minutes(30);
        assert!(!o.is_stale_pending(past_cutoff));

        o.mark_paid(paid_fields()).unwrap();
        assert!(!o.is_stale_pending(future_cutoff));
    }
}
