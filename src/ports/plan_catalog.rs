//! PlanCatalog port - Membership plan metadata.
//!
//! The catalog itself (CRUD, pricing administration) lives outside this
//! core; orders only need to resolve a plan reference to its price, days
//! and level.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PlanId};
use crate::domain::membership::MembershipPlan;

/// Port for resolving membership plans.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_plan(&self, id: &PlanId) -> Result<Option<MembershipPlan>, DomainError>;
}
