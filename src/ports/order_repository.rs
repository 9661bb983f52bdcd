//! OrderRepository port - PaymentOrder persistence.
//!
//! The PAID transition is deliberately not read-modify-write: concurrent
//! duplicate TRADE_SUCCESS deliveries and reconciliation queries race for
//! the same order, and only one of them may win (a double transition would
//! double-invoke entitlement activation). `mark_paid_if_pending` and
//! `update_status_if_pending` are compare-and-swap writes
//! (`UPDATE ... WHERE status = 'pending'`) reporting whether the row was
//! won.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::payment::{OrderStatus, PaidFields, PaymentOrder};

/// Result of a compare-and-swap status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// This caller won the transition.
    Applied,

    /// The guard did not match; someone else transitioned the row first
    /// (or it was never PENDING).
    NotApplied,
}

/// Port for PaymentOrder storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order.
    ///
    /// Implementations map an `out_trade_no` unique violation to
    /// `ErrorCode::DuplicateKey`.
    async fn insert(&self, order: &PaymentOrder) -> Result<(), DomainError>;

    /// Full-row update for non-contended fields (payment_no, soft delete).
    async fn update(&self, order: &PaymentOrder) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentOrder>, DomainError>;

    async fn find_by_out_trade_no(
        &self,
        out_trade_no: &str,
    ) -> Result<Option<PaymentOrder>, DomainError>;

    /// Counts non-deleted PENDING orders for the user.
    async fn count_pending_for_user(&self, user_id: &UserId) -> Result<u64, DomainError>;

    /// Compare-and-swap PAID transition. Applies the paid fields only when
    /// the row is still PENDING.
    async fn mark_paid_if_pending(
        &self,
        out_trade_no: &str,
        fields: &PaidFields,
    ) -> Result<CasOutcome, DomainError>;

    /// Compare-and-swap transition to CLOSED or CANCELLED, guarded on
    /// PENDING.
    async fn update_status_if_pending(
        &self,
        out_trade_no: &str,
        status: OrderStatus,
    ) -> Result<CasOutcome, DomainError>;

    /// PENDING orders created before the cutoff, oldest first.
    async fn find_stale_pending(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PaymentOrder>, DomainError>;
}
