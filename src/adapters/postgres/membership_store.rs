//! PostgreSQL implementation of MembershipStore.
//!
//! `save_activation` runs the membership upsert and the renewal-record
//! insert inside one transaction; either both land or neither does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, MembershipId, PlanId, Timestamp, UserId,
};
use crate::domain::membership::{MembershipRenewalRecord, UserMembership};
use crate::ports::MembershipStore;

/// PostgreSQL implementation of the MembershipStore port.
pub struct PostgresMembershipStore {
    pool: PgPool,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a membership.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    is_active: bool,
    total_days: i64,
    level: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for UserMembership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let total_days = u32::try_from(row.total_days).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid total_days value: {}", row.total_days),
            )
        })?;
        let level = u8::try_from(row.level).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid level value: {}", row.level),
            )
        })?;

        Ok(UserMembership {
            id: MembershipId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            plan_id: PlanId::from_uuid(row.plan_id),
            start_time: Timestamp::from_datetime(row.start_time),
            end_time: Timestamp::from_datetime(row.end_time),
            is_active: row.is_active,
            total_days,
            level,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, plan_id, start_time, end_time, is_active,
                   total_days, level, created_at, updated_at
            FROM user_memberships
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find membership: {}", e)))?;

        row.map(UserMembership::try_from).transpose()
    }

    async fn save_activation(
        &self,
        membership: &UserMembership,
        record: &MembershipRenewalRecord,
    ) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to open transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO user_memberships (
                id, user_id, plan_id, start_time, end_time, is_active,
                total_days, level, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                is_active = EXCLUDED.is_active,
                total_days = EXCLUDED.total_days,
                level = EXCLUDED.level,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(membership.id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.plan_id.as_uuid())
        .bind(membership.start_time.as_datetime())
        .bind(membership.end_time.as_datetime())
        .bind(membership.is_active)
        .bind(i64::from(membership.total_days))
        .bind(i16::from(membership.level))
        .bind(membership.created_at.as_datetime())
        .bind(membership.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert membership: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO membership_renewal_records (
                id, membership_id, user_id, order_id, plan_id, kind, days_granted,
                amount_cents, remaining_days_at_renewal, start_before, end_before,
                start_after, end_after, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.membership_id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.plan_id.as_uuid())
        .bind(record.kind.as_str())
        .bind(i64::from(record.days_granted))
        .bind(record.amount_cents)
        .bind(record.remaining_days_at_renewal)
        .bind(record.start_before.as_ref().map(|t| *t.as_datetime()))
        .bind(record.end_before.as_ref().map(|t| *t.as_datetime()))
        .bind(record.start_after.as_datetime())
        .bind(record.end_after.as_datetime())
        .bind(record.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert renewal record: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit activation: {}", e)))?;

        Ok(())
    }
}
