//! Membership plans and the cumulative level ladder.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::PlanId;

/// Cumulative-days thresholds for membership levels, highest first.
const LEVEL_THRESHOLDS: &[(u32, u8)] = &[(1080, 5), (720, 4), (360, 3), (180, 2), (0, 1)];

/// A purchasable membership plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPlan {
    pub id: PlanId,

    /// Display name, used as the order subject.
    pub name: String,

    /// Days of entitlement granted per purchase.
    pub days: u32,

    /// Tier of the plan itself; purchases below the user's current active
    /// level are rejected as downgrades.
    pub level: u8,

    /// Price in cents.
    pub price_cents: i64,
}

/// Level a user holds after accumulating `total_days` of entitlement.
pub fn level_for_total_days(total_days: u32) -> u8 {
    LEVEL_THRESHOLDS
        .iter()
        .find(|(threshold, _)| total_days >= *threshold)
        .map(|(_, level)| *level)
        .unwrap_or(1)
}
