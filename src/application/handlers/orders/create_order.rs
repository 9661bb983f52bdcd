//! CreateOrderHandler - Command handler for starting a payment.
//!
//! Guards run before anything is persisted: one in-flight PENDING order
//! per user, and plan purchases must not downgrade an active membership.
//! Once the row is persisted a gateway failure leaves it in place; the
//! caller retries through repay, never through a silent re-create.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, PlanId, Timestamp, UserId};
use crate::domain::payment::{PaymentError, PaymentOrder};
use crate::ports::{MembershipStore, OrderRepository, PagePayRequest, PaymentGateway, PlanCatalog};

/// Command to create a payment order.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub user_id: UserId,
    pub amount_cents: i64,
    pub subject: String,
    /// Membership plan being purchased, if any.
    pub plan_id: Option<PlanId>,
}

/// Result of order creation.
#[derive(Debug, Clone)]
pub struct CreateOrderResult {
    pub order_id: PaymentId,
    pub order_sn: String,
    pub out_trade_no: String,
    pub pay_url: String,
}

/// Handler for order creation.
pub struct CreateOrderHandler {
    orders: Arc<dyn OrderRepository>,
    memberships: Arc<dyn MembershipStore>,
    plans: Arc<dyn PlanCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    product_code: String,
}

impl CreateOrderHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        memberships: Arc<dyn MembershipStore>,
        plans: Arc<dyn PlanCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        product_code: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            memberships,
            plans,
            gateway,
            product_code: product_code.into(),
        }
    }

    pub async fn handle(&self, cmd: CreateOrderCommand) -> Result<CreateOrderResult, PaymentError> {
        // One in-flight commercial transaction per user. Count-then-insert
        // is racy under double-submission; the partial unique index on
        // (user_id) WHERE status = 'pending' backstops it.
        if self.orders.count_pending_for_user(&cmd.user_id).await? > 0 {
            return Err(PaymentError::PendingOrderExists {
                user_id: cmd.user_id,
            });
        }

        if let Some(plan_id) = cmd.plan_id {
            self.check_plan_purchase(&cmd, plan_id).await?;
        }

        let order = PaymentOrder::new(
            cmd.user_id,
            cmd.amount_cents,
            cmd.subject,
            cmd.plan_id,
            self.product_code.clone(),
        )?;
        self.orders.insert(&order).await?;

        // Row stays persisted on gateway failure; no silent retry.
        let pay_url = self.gateway.build_pay_url(&PagePayRequest {
            out_trade_no: order.out_trade_no.clone(),
            amount_cents: order.amount_cents,
            subject: order.subject.clone(),
            product_code: order.product_code.clone(),
        })?;

        tracing::info!(
            order_id = %order.id,
            out_trade_no = %order.out_trade_no,
            user_id = %order.user_id,
            amount_cents = order.amount_cents,
            "order created"
        );

        Ok(CreateOrderResult {
            order_id: order.id,
            order_sn: order.order_sn,
            out_trade_no: order.out_trade_no,
            pay_url,
        })
    }

    async fn check_plan_purchase(
        &self,
        cmd: &CreateOrderCommand,
        plan_id: PlanId,
    ) -> Result<(), PaymentError> {
        let plan = self
            .plans
            .find_plan(&plan_id)
            .await?
            .ok_or(PaymentError::PlanNotFound { plan_id })?;

        if cmd.amount_cents != plan.price_cents {
            return Err(PaymentError::validation(
                "amount",
                format!(
                    "plan '{}' costs {} cents, got {}",
                    plan.name, plan.price_cents, cmd.amount_cents
                ),
            ));
        }

        if let Some(membership) = self.memberships.find_by_user(&cmd.user_id).await? {
            if membership.covers(Timestamp::now()) && plan.level < membership.level {
                return Err(PaymentError::MembershipDowngrade {
                    plan: plan.name,
                    current_level: membership.level,
                });
            }
        }

        Ok(())
    }
}
