//! NotificationRepository port - Durable webhook audit rows.
//!
//! The processor inserts the raw delivery *before* verifying it, so every
//! delivery is recorded even if the process crashes mid-pipeline. Rows are
//! updated as verification and processing progress, and never lost.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, NotificationId, PaymentId};
use crate::domain::payment::GatewayNotification;

/// Port for GatewayNotification storage.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &GatewayNotification) -> Result<(), DomainError>;

    async fn update(&self, notification: &GatewayNotification) -> Result<(), DomainError>;

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<GatewayNotification>, DomainError>;

    /// All deliveries linked to an order, for operational repair.
    async fn find_by_order(
        &self,
        order_id: &PaymentId,
    ) -> Result<Vec<GatewayNotification>, DomainError>;
}
