//! Membership renewal audit records.
//!
//! One row per activation, capturing the before/after windows and how the
//! activation was classified. Written in the same transaction as the
//! membership update.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    MembershipId, PaymentId, PlanId, RenewalRecordId, Timestamp, UserId,
};

/// How an activation changed the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalKind {
    /// First membership for the user.
    Initial,

    /// Previous window had expired; a fresh window was started.
    Restart,

    /// Active window extended with the same plan.
    Renewal,

    /// Active window extended and the plan changed.
    Upgrade,
}

impl RenewalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalKind::Initial => "initial",
            RenewalKind::Restart => "restart",
            RenewalKind::Renewal => "renewal",
            RenewalKind::Upgrade => "upgrade",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(RenewalKind::Initial),
            "restart" => Some(RenewalKind::Restart),
            "renewal" => Some(RenewalKind::Renewal),
            "upgrade" => Some(RenewalKind::Upgrade),
            _ => None,
        }
    }
}

/// Audit row for one membership activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRenewalRecord {
    pub id: RenewalRecordId,
    pub membership_id: MembershipId,
    pub user_id: UserId,

    /// The paid order that triggered this activation.
    pub order_id: PaymentId,

    /// Plan purchased.
    pub plan_id: PlanId,

    pub kind: RenewalKind,

    /// Days granted by this activation.
    pub days_granted: u32,

    /// Amount of the triggering order, in cents.
    pub amount_cents: i64,

    /// Whole days left on the old window at activation time. Negative when
    /// the window had already expired. Audit only; never feeds the window
    /// arithmetic.
    pub remaining_days_at_renewal: i64,

    pub start_before: Option<Timestamp>,
    pub end_before: Option<Timestamp>,
    pub start_after: Timestamp,
    pub end_after: Timestamp,

    pub created_at: Timestamp,
}
