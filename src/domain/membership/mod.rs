//! Membership domain module.
//!
//! Time-bounded entitlements activated by successful payments.
//!
//! # Module Structure
//!
//! - `plan` - MembershipPlan catalog entries and the level ladder
//! - `membership` - UserMembership aggregate and renewal arithmetic
//! - `renewal` - MembershipRenewalRecord audit rows

mod membership;
mod plan;
mod renewal;

pub use membership::{ActivationOutcome, UserMembership};
pub use plan::{level_for_total_days, MembershipPlan};
pub use renewal::{MembershipRenewalRecord, RenewalKind};
