//! PostgreSQL implementation of PlanCatalog.
//!
//! Read-only lookup over the plan table the catalog service maintains;
//! plan administration lives outside this core.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, PlanId};
use crate::domain::membership::MembershipPlan;
use crate::ports::PlanCatalog;

/// PostgreSQL implementation of the PlanCatalog port.
pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name: String,
    days: i64,
    level: i16,
    price_cents: i64,
}

impl TryFrom<PlanRow> for MembershipPlan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let days = u32::try_from(row.days).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid plan days value: {}", row.days),
            )
        })?;
        let level = u8::try_from(row.level).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid plan level value: {}", row.level),
            )
        })?;

        Ok(MembershipPlan {
            id: PlanId::from_uuid(row.id),
            name: row.name,
            days,
            level,
            price_cents: row.price_cents,
        })
    }
}

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_plan(&self, id: &PlanId) -> Result<Option<MembershipPlan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            "SELECT id, name, days, level, price_cents FROM membership_plans WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find plan: {}", e)))?;

        row.map(MembershipPlan::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_row_round_trips_into_domain() {
        let row = PlanRow {
            id: Uuid::new_v4(),
            name: "Annual".to_string(),
            days: 360,
            level: 3,
            price_cents: 88800,
        };

        let plan = MembershipPlan::try_from(row).unwrap();
        assert_eq!(plan.days, 360);
        assert_eq!(plan.level, 3);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let row = PlanRow {
            id: Uuid::new_v4(),
            name: "Broken".to_string(),
            days: 30,
            level: 300,
            price_cents: 100,
        };

        assert!(MembershipPlan::try_from(row).is_err());
    }
}
