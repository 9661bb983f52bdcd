//! PostgreSQL implementation of RefundRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, RefundId, Timestamp};
use crate::domain::payment::{PaymentRefund, RefundStatus};
use crate::ports::RefundRepository;

const SELECT_COLUMNS: &str = "id, order_id, out_request_no, refund_amount_cents, \
     refund_fee_cents, reason, status, refund_status, created_at, updated_at";

/// PostgreSQL implementation of the RefundRepository port.
pub struct PostgresRefundRepository {
    pool: PgPool,
}

impl PostgresRefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a refund.
#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    order_id: Uuid,
    out_request_no: String,
    refund_amount_cents: i64,
    refund_fee_cents: Option<i64>,
    reason: String,
    status: String,
    refund_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for PaymentRefund {
    type Error = DomainError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        let status = RefundStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid refund status value: {}", row.status),
            )
        })?;

        Ok(PaymentRefund {
            id: RefundId::from_uuid(row.id),
            order_id: PaymentId::from_uuid(row.order_id),
            out_request_no: row.out_request_no,
            refund_amount_cents: row.refund_amount_cents,
            refund_fee_cents: row.refund_fee_cents,
            reason: row.reason,
            status,
            refund_status: row.refund_status,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl RefundRepository for PostgresRefundRepository {
    async fn insert(&self, refund: &PaymentRefund) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_refunds (
                id, order_id, out_request_no, refund_amount_cents, refund_fee_cents,
                reason, status, refund_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(refund.id.as_uuid())
        .bind(refund.order_id.as_uuid())
        .bind(&refund.out_request_no)
        .bind(refund.refund_amount_cents)
        .bind(refund.refund_fee_cents)
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(&refund.refund_status)
        .bind(refund.created_at.as_datetime())
        .bind(refund.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("payment_refunds_out_request_no_key") {
                    return DomainError::duplicate("out_request_no already exists");
                }
            }
            DomainError::database(format!("Failed to insert refund: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, refund: &PaymentRefund) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_refunds SET
                refund_fee_cents = $2,
                status = $3,
                refund_status = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(refund.id.as_uuid())
        .bind(refund.refund_fee_cents)
        .bind(refund.status.as_str())
        .bind(&refund.refund_status)
        .bind(refund.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update refund: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RefundNotFound,
                refund.id.to_string(),
            ));
        }

        Ok(())
    }

    async fn find_by_out_request_no(
        &self,
        out_request_no: &str,
    ) -> Result<Option<PaymentRefund>, DomainError> {
        let row: Option<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_refunds WHERE out_request_no = $1",
            SELECT_COLUMNS
        ))
        .bind(out_request_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find refund: {}", e)))?;

        row.map(PaymentRefund::try_from).transpose()
    }

    async fn find_by_order(&self, order_id: &PaymentId) -> Result<Vec<PaymentRefund>, DomainError> {
        let rows: Vec<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_refunds WHERE order_id = $1 ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list refunds: {}", e)))?;

        rows.into_iter().map(PaymentRefund::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_row_round_trips_into_domain() {
        let row = RefundRow {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            out_request_no: "req-1".to_string(),
            refund_amount_cents: 500,
            refund_fee_cents: Some(500),
            reason: "buyer request".to_string(),
            status: "success".to_string(),
            refund_status: Some("REFUND_SUCCESS".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let refund = PaymentRefund::try_from(row).unwrap();
        assert_eq!(refund.status, RefundStatus::Success);
        assert_eq!(refund.refund_amount_cents, 500);
    }

    #[test]
    fn invalid_status_string_is_rejected() {
        let row = RefundRow {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            out_request_no: "req-2".to_string(),
            refund_amount_cents: 500,
            refund_fee_cents: None,
            reason: "x".to_string(),
            status: "maybe".to_string(),
            refund_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(PaymentRefund::try_from(row).is_err());
    }
}
