//! PostgreSQL implementation of OrderRepository.
//!
//! The PAID and close/cancel transitions are single-statement
//! compare-and-swap updates guarded on `status = 'pending'`;
//! `rows_affected` decides who won. The partial unique index
//! `payment_orders_one_pending_per_user` backstops the one-pending-order
//! rule under concurrent inserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, PlanId, Timestamp, UserId};
use crate::domain::payment::{OrderStatus, PaidFields, PaymentOrder};
use crate::ports::{CasOutcome, OrderRepository};

const SELECT_COLUMNS: &str = "id, payment_no, order_sn, out_trade_no, user_id, amount_cents, \
     subject, plan_id, product_code, status, trade_no, trade_status, buyer_id, buyer_logon_id, \
     receipt_amount_cents, pay_time, created_at, updated_at, deleted_at";

/// PostgreSQL implementation of the OrderRepository port.
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    payment_no: String,
    order_sn: String,
    out_trade_no: String,
    user_id: Uuid,
    amount_cents: i64,
    subject: String,
    plan_id: Option<Uuid>,
    product_code: String,
    status: String,
    trade_no: Option<String>,
    trade_status: Option<String>,
    buyer_id: Option<String>,
    buyer_logon_id: Option<String>,
    receipt_amount_cents: Option<i64>,
    pay_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for PaymentOrder {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid order status value: {}", row.status),
            )
        })?;

        Ok(PaymentOrder {
            id: PaymentId::from_uuid(row.id),
            payment_no: row.payment_no,
            order_sn: row.order_sn,
            out_trade_no: row.out_trade_no,
            user_id: UserId::from_uuid(row.user_id),
            amount_cents: row.amount_cents,
            subject: row.subject,
            plan_id: row.plan_id.map(PlanId::from_uuid),
            product_code: row.product_code,
            status,
            trade_no: row.trade_no,
            trade_status: row.trade_status,
            buyer_id: row.buyer_id,
            buyer_logon_id: row.buyer_logon_id,
            receipt_amount_cents: row.receipt_amount_cents,
            pay_time: row.pay_time.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

fn map_insert_error(e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("payment_orders_out_trade_no_key") => {
                return DomainError::duplicate("out_trade_no already exists")
            }
            Some("payment_orders_one_pending_per_user") => {
                return DomainError::duplicate("user already has a pending order")
            }
            _ => {}
        }
    }
    DomainError::database(format!("Failed to insert order: {}", e))
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_orders (
                id, payment_no, order_sn, out_trade_no, user_id, amount_cents, subject,
                plan_id, product_code, status, trade_no, trade_status, buyer_id,
                buyer_logon_id, receipt_amount_cents, pay_time, created_at, updated_at, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.payment_no)
        .bind(&order.order_sn)
        .bind(&order.out_trade_no)
        .bind(order.user_id.as_uuid())
        .bind(order.amount_cents)
        .bind(&order.subject)
        .bind(order.plan_id.as_ref().map(|p| *p.as_uuid()))
        .bind(&order.product_code)
        .bind(order.status.as_str())
        .bind(&order.trade_no)
        .bind(&order.trade_status)
        .bind(&order.buyer_id)
        .bind(&order.buyer_logon_id)
        .bind(order.receipt_amount_cents)
        .bind(order.pay_time.as_ref().map(|t| *t.as_datetime()))
        .bind(order.created_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .bind(order.deleted_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn update(&self, order: &PaymentOrder) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders SET
                payment_no = $2,
                status = $3,
                trade_no = $4,
                trade_status = $5,
                buyer_id = $6,
                buyer_logon_id = $7,
                receipt_amount_cents = $8,
                pay_time = $9,
                updated_at = $10,
                deleted_at = $11
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.payment_no)
        .bind(order.status.as_str())
        .bind(&order.trade_no)
        .bind(&order.trade_status)
        .bind(&order.buyer_id)
        .bind(&order.buyer_logon_id)
        .bind(order.receipt_amount_cents)
        .bind(order.pay_time.as_ref().map(|t| *t.as_datetime()))
        .bind(order.updated_at.as_datetime())
        .bind(order.deleted_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update order: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::OrderNotFound,
                order.id.to_string(),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentOrder>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_orders WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find order: {}", e)))?;

        row.map(PaymentOrder::try_from).transpose()
    }

    async fn find_by_out_trade_no(
        &self,
        out_trade_no: &str,
    ) -> Result<Option<PaymentOrder>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_orders WHERE out_trade_no = $1",
            SELECT_COLUMNS
        ))
        .bind(out_trade_no)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find order: {}", e)))?;

        row.map(PaymentOrder::try_from).transpose()
    }

    async fn count_pending_for_user(&self, user_id: &UserId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payment_orders
            WHERE user_id = $1 AND status = 'pending' AND deleted_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to count pending orders: {}", e)))?;

        Ok(count as u64)
    }

    async fn mark_paid_if_pending(
        &self,
        out_trade_no: &str,
        fields: &PaidFields,
    ) -> Result<CasOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders SET
                status = 'paid',
                trade_no = $2,
                trade_status = $3,
                buyer_id = $4,
                buyer_logon_id = $5,
                receipt_amount_cents = $6,
                pay_time = $7,
                updated_at = NOW()
            WHERE out_trade_no = $1 AND status = 'pending'
            "#,
        )
        .bind(out_trade_no)
        .bind(&fields.trade_no)
        .bind(&fields.trade_status)
        .bind(&fields.buyer_id)
        .bind(&fields.buyer_logon_id)
        .bind(fields.receipt_amount_cents)
        .bind(fields.pay_time.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark order paid: {}", e)))?;

        Ok(if result.rows_affected() == 1 {
            CasOutcome::Applied
        } else {
            CasOutcome::NotApplied
        })
    }

    async fn update_status_if_pending(
        &self,
        out_trade_no: &str,
        status: OrderStatus,
    ) -> Result<CasOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_orders SET status = $2, updated_at = NOW()
            WHERE out_trade_no = $1 AND status = 'pending'
            "#,
        )
        .bind(out_trade_no)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update order status: {}", e)))?;

        Ok(if result.rows_affected() == 1 {
            CasOutcome::Applied
        } else {
            CasOutcome::NotApplied
        })
    }

    async fn find_stale_pending(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<PaymentOrder>, DomainError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payment_orders
            WHERE status = 'pending' AND deleted_at IS NULL AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(cutoff.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list stale orders: {}", e)))?;

        rows.into_iter().map(PaymentOrder::try_from).collect()
    }
}
