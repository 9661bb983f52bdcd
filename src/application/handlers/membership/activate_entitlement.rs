//! ActivateEntitlementHandler - Command handler for membership activation.
//!
//! Runs after an order reaches PAID for a plan purchase. The window
//! arithmetic is pure domain logic; this handler resolves the plan, loads
//! the current membership and persists the outcome atomically with its
//! audit record.
//!
//! By design the caller never rolls back the order's PAID status when this
//! fails: the gateway already captured the funds, so activation failures
//! are surfaced as a distinct operational error for out-of-band repair.

use std::sync::Arc;

use crate::domain::foundation::{MembershipId, PaymentId, PlanId, Timestamp, UserId};
use crate::domain::membership::{RenewalKind, UserMembership};
use crate::domain::payment::PaymentError;
use crate::ports::{MembershipStore, PlanCatalog};

/// Command to activate the entitlement purchased by a paid order.
#[derive(Debug, Clone)]
pub struct ActivateEntitlementCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub order_id: PaymentId,
    pub amount_cents: i64,
}

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub membership_id: MembershipId,
    pub kind: RenewalKind,
    pub end_time: Timestamp,
    pub level: u8,
}

/// Handler for membership entitlement activation.
pub struct ActivateEntitlementHandler {
    memberships: Arc<dyn MembershipStore>,
    plans: Arc<dyn PlanCatalog>,
}

impl ActivateEntitlementHandler {
    pub fn new(memberships: Arc<dyn MembershipStore>, plans: Arc<dyn PlanCatalog>) -> Self {
        Self { memberships, plans }
    }

    pub async fn handle(
        &self,
        cmd: ActivateEntitlementCommand,
    ) -> Result<ActivationResult, PaymentError> {
        let plan = self
            .plans
            .find_plan(&cmd.plan_id)
            .await?
            .ok_or(PaymentError::PlanNotFound {
                plan_id: cmd.plan_id,
            })?;

        let existing = self.memberships.find_by_user(&cmd.user_id).await?;
        let now = Timestamp::now();

        let outcome = UserMembership::activate(
            existing,
            cmd.user_id,
            &plan,
            cmd.order_id,
            cmd.amount_cents,
            now,
        );

        self.memberships
            .save_activation(&outcome.membership, &outcome.record)
            .await?;

        tracing::info!(
            user_id = %cmd.user_id,
            order_id = %cmd.order_id,
            kind = outcome.record.kind.as_str(),
            end_time = %outcome.membership.end_time.to_wire_format(),
            level = outcome.membership.level,
            "membership activated"
        );

        Ok(ActivationResult {
            membership_id: outcome.membership.id,
            kind: outcome.record.kind,
            end_time: outcome.membership.end_time,
            level: outcome.membership.level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{InMemoryMemberships, StaticCatalog};
    use crate::domain::membership::MembershipPlan;

    fn plan(days: u32, level: u8) -> MembershipPlan {
        MembershipPlan {
            id: PlanId::new(),
            name: format!("{}-day", days),
            days,
            level,
            price_cents: 8800,
        }
    }

    fn handler(
        memberships: Arc<InMemoryMemberships>,
        plans: Vec<MembershipPlan>,
    ) -> ActivateEntitlementHandler {
        ActivateEntitlementHandler::new(memberships, Arc::new(StaticCatalog::new(plans)))
    }

    #[tokio::test]
    async fn first_purchase_creates_a_membership() {
        let memberships = Arc::new(InMemoryMemberships::new());
        let p = plan(30, 1);
        let h = handler(memberships.clone(), vec![p.clone()]);
        let user_id = UserId::new();

        let result = h
            .handle(ActivateEntitlementCommand {
                user_id,
                plan_id: p.id,
                order_id: PaymentId::new(),
                amount_cents: 8800,
            })
            .await
            .unwrap();

        assert_eq!(result.kind, RenewalKind::Initial);
        let stored = memberships.find(&user_id).await.unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.total_days, 30);
        assert_eq!(memberships.record_count().await, 1);
    }

    #[tokio::test]
    async fn second_purchase_extends_and_records() {
        let memberships = Arc::new(InMemoryMemberships::new());
        let p = plan(30, 1);
        let h = handler(memberships.clone(), vec![p.clone()]);
        let user_id = UserId::new();

        let cmd = ActivateEntitlementCommand {
            user_id,
            plan_id: p.id,
            order_id: PaymentId::new(),
            amount_cents: 8800,
        };
        h.handle(cmd.clone()).await.unwrap();
        let first_end = memberships.find(&user_id).await.unwrap().end_time;

        let result = h.handle(cmd).await.unwrap();

        assert_eq!(result.kind, RenewalKind::Renewal);
        assert_eq!(result.end_time, first_end.add_days(30));
        assert_eq!(memberships.record_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_plan_is_rejected() {
        let memberships = Arc::new(InMemoryMemberships::new());
        let h = handler(memberships, vec![]);

        let result = h
            .handle(ActivateEntitlementCommand {
                user_id: UserId::new(),
                plan_id: PlanId::new(),
                order_id: PaymentId::new(),
                amount_cents: 8800,
            })
            .await;

        assert!(matches!(result, Err(PaymentError::PlanNotFound { .. })));
    }
}
