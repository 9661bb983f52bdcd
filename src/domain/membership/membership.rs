//! UserMembership aggregate and renewal arithmetic.
//!
//! # Invariants
//!
//! - One membership row per user (database constraint)
//! - `end_time` never regresses across activations
//! - `total_days` accumulates over the lifetime of the account
//!
//! Window arithmetic on activation:
//! - no membership: fresh window `[now, now + days]`
//! - expired membership: restart `[now, now + days]`, unused time is gone
//! - active membership: `end_time += days`, stacking on top of the current
//!   end so unused time is preserved; the plan id follows the purchase

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{MembershipId, PaymentId, PlanId, Timestamp, UserId};

use super::plan::{level_for_total_days, MembershipPlan};
use super::renewal::{MembershipRenewalRecord, RenewalKind};

/// A user's membership window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMembership {
    pub id: MembershipId,

    /// Owning user; unique.
    pub user_id: UserId,

    /// Plan of the most recent activation.
    pub plan_id: PlanId,

    pub start_time: Timestamp,
    pub end_time: Timestamp,

    pub is_active: bool,

    /// Cumulative days granted across all activations.
    pub total_days: u32,

    /// Level derived from `total_days`.
    pub level: u8,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserMembership {
    /// True when the window covers `now`.
    pub fn covers(&self, now: Timestamp) -> bool {
        self.is_active && now <= self.end_time
    }

    /// Whole days between `now` and the end of the window; negative when
    /// the window has expired.
    pub fn remaining_days(&self, now: Timestamp) -> i64 {
        self.end_time.duration_since(&now).num_days()
    }
}

/// Result of running an activation: the membership to persist and its
/// audit record, written atomically by the store.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    pub membership: UserMembership,
    pub record: MembershipRenewalRecord,
}

impl UserMembership {
    /// Applies a paid plan purchase to the user's membership.
    ///
    /// Pure: computes the new membership state and audit record without
    /// touching storage. The caller persists both in one transaction.
    pub fn activate(
        existing: Option<UserMembership>,
        user_id: UserId,
        plan: &MembershipPlan,
        order_id: PaymentId,
        amount_cents: i64,
        now: Timestamp,
    ) -> ActivationOutcome {
        let days = i64::from(plan.days);

        match existing {
            None => {
                let total_days = plan.days;
                let membership = UserMembership {
                    id: MembershipId::new(),
                    user_id,
                    plan_id: plan.id,
                    start_time: now,
                    end_time: now.add_days(days),
                    is_active: true,
                    total_days,
                    level: level_for_total_days(total_days),
                    created_at: now,
                    updated_at: now,
                };
                let record = build_record(
                    &membership,
                    None,
                    plan,
                    order_id,
                    amount_cents,
                    RenewalKind::Initial,
                    0,
                    now,
                );
                ActivationOutcome { membership, record }
            }
            Some(previous) => {
                let remaining = previous.remaining_days(now);
                let expired = previous.end_time.is_before(&now) || !previous.is_active;

                let (kind, start_time, end_time) = if expired {
                    (RenewalKind::Restart, now, now.add_days(days))
                } else if previous.plan_id == plan.id {
                    (RenewalKind::Renewal, previous.start_time, previous.end_time.add_days(days))
                } else {
                    (RenewalKind::Upgrade, previous.start_time, previous.end_time.add_days(days))
                };

                let total_days = previous.total_days + plan.days;
                let membership = UserMembership {
                    id: previous.id,
                    user_id,
                    plan_id: plan.id,
                    start_time,
                    end_time,
                    is_active: true,
                    total_days,
                    level: level_for_total_days(total_days),
                    created_at: previous.created_at,
                    updated_at: now,
                };
                let record = build_record(
                    &membership,
                    Some(&previous),
                    plan,
                    order_id,
                    amount_cents,
                    kind,
                    remaining,
                    now,
                );
                ActivationOutcome { membership, record }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    membership: &UserMembership,
    previous: Option<&UserMembership>,
    plan: &MembershipPlan,
    order_id: PaymentId,
    amount_cents: i64,
    kind: RenewalKind,
    remaining_days: i64,
    now: Timestamp,
) -> MembershipRenewalRecord {
    MembershipRenewalRecord {
        id: crate::domain::foundation::RenewalRecordId::new(),
        membership_id: membership.id,
        user_id: membership.user_id,
        order_id,
        plan_id: plan.id,
        kind,
        days_granted: plan.days,
        amount_cents,
        remaining_days_at_renewal: remaining_days,
        start_before: previous.map(|p| p.start_time),
        end_before: previous.map(|p| p.end_time),
        start_after: membership.start_time,
        end_after: membership.end_time,
        created_at: now,
    }
}
