//! PostgreSQL implementation of NotificationRepository.
//!
//! Rows are inserted before verification and only ever move their status
//! ladders forward; nothing here deletes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, NotificationId, PaymentId, Timestamp};
use crate::domain::payment::{GatewayNotification, ProcessStatus, VerifyStatus};
use crate::ports::NotificationRepository;

const SELECT_COLUMNS: &str = "id, order_id, notify_id, notify_type, raw_body, sign, sign_type, \
     verify_status, process_status, error_message, processed_at, created_at";

/// PostgreSQL implementation of the NotificationRepository port.
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a notification.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    order_id: Option<Uuid>,
    notify_id: Option<String>,
    notify_type: Option<String>,
    raw_body: String,
    sign: Option<String>,
    sign_type: Option<String>,
    verify_status: String,
    process_status: String,
    error_message: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for GatewayNotification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let verify_status = VerifyStatus::parse(&row.verify_status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid verify status value: {}", row.verify_status),
            )
        })?;
        let process_status = ProcessStatus::parse(&row.process_status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid process status value: {}", row.process_status),
            )
        })?;

        Ok(GatewayNotification {
            id: NotificationId::from_uuid(row.id),
            order_id: row.order_id.map(PaymentId::from_uuid),
            notify_id: row.notify_id,
            notify_type: row.notify_type,
            raw_body: row.raw_body,
            sign: row.sign,
            sign_type: row.sign_type,
            verify_status,
            process_status,
            error_message: row.error_message,
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert(&self, notification: &GatewayNotification) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payment_notifications (
                id, order_id, notify_id, notify_type, raw_body, sign, sign_type,
                verify_status, process_status, error_message, processed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.order_id.as_ref().map(|p| *p.as_uuid()))
        .bind(&notification.notify_id)
        .bind(&notification.notify_type)
        .bind(&notification.raw_body)
        .bind(&notification.sign)
        .bind(&notification.sign_type)
        .bind(notification.verify_status.as_str())
        .bind(notification.process_status.as_str())
        .bind(&notification.error_message)
        .bind(notification.processed_at.as_ref().map(|t| *t.as_datetime()))
        .bind(notification.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert notification: {}", e)))?;

        Ok(())
    }

    async fn update(&self, notification: &GatewayNotification) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_notifications SET
                order_id = $2,
                verify_status = $3,
                process_status = $4,
                error_message = $5,
                processed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.order_id.as_ref().map(|p| *p.as_uuid()))
        .bind(notification.verify_status.as_str())
        .bind(notification.process_status.as_str())
        .bind(&notification.error_message)
        .bind(notification.processed_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update notification: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotificationNotFound,
                notification.id.to_string(),
            ));
        }

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<GatewayNotification>, DomainError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_notifications WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find notification: {}", e)))?;

        row.map(GatewayNotification::try_from).transpose()
    }

    async fn find_by_order(
        &self,
        order_id: &PaymentId,
    ) -> Result<Vec<GatewayNotification>, DomainError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_notifications WHERE order_id = $1 ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list notifications: {}", e)))?;

        rows.into_iter().map(GatewayNotification::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_row_round_trips_into_domain() {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            order_id: Some(Uuid::new_v4()),
            notify_id: Some("n1".to_string()),
            notify_type: Some("trade_status_sync".to_string()),
            raw_body: "out_trade_no=1&trade_status=TRADE_SUCCESS".to_string(),
            sign: Some("SIG".to_string()),
            sign_type: Some("RSA2".to_string()),
            verify_status: "passed".to_string(),
            process_status: "success".to_string(),
            error_message: None,
            processed_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        let notification = GatewayNotification::try_from(row).unwrap();
        assert_eq!(notification.verify_status, VerifyStatus::Passed);
        assert_eq!(notification.process_status, ProcessStatus::Success);
        assert!(notification.order_id.is_some());
    }

    #[test]
    fn invalid_status_strings_are_rejected() {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            order_id: None,
            notify_id: None,
            notify_type: None,
            raw_body: String::new(),
            sign: None,
            sign_type: None,
            verify_status: "hmm".to_string(),
            process_status: "pending".to_string(),
            error_message: None,
            processed_at: None,
            created_at: Utc::now(),
        };

        assert!(GatewayNotification::try_from(row).is_err());
    }
}
