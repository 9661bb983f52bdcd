//! MembershipStore port - Atomic membership activation.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::membership::{MembershipRenewalRecord, UserMembership};

/// Port for membership persistence.
///
/// `save_activation` must write the membership upsert and its renewal
/// record in one transaction: an audit row without the matching window
/// change (or vice versa) is a reconciliation gap.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The user's membership row, if any. One row per user.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError>;

    /// Atomically upserts the membership and inserts the renewal record.
    async fn save_activation(
        &self,
        membership: &UserMembership,
        record: &MembershipRenewalRecord,
    ) -> Result<(), DomainError>;
}
