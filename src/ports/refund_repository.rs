//! RefundRepository port - PaymentRefund persistence.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId};
use crate::domain::payment::PaymentRefund;

/// Port for PaymentRefund storage.
///
/// `out_request_no` carries a unique constraint; implementations map its
/// violation to `ErrorCode::DuplicateKey`.
#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn insert(&self, refund: &PaymentRefund) -> Result<(), DomainError>;

    async fn update(&self, refund: &PaymentRefund) -> Result<(), DomainError>;

    async fn find_by_out_request_no(
        &self,
        out_request_no: &str,
    ) -> Result<Option<PaymentRefund>, DomainError>;

    async fn find_by_order(&self, order_id: &PaymentId) -> Result<Vec<PaymentRefund>, DomainError>;
}
