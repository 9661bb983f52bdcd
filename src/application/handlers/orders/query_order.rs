//! QueryOrderHandler - Command handler for resolving an order's state.
//!
//! Locally settled orders short-circuit without a gateway call. PENDING
//! orders are resolved against the provider; a paid answer runs the same
//! CAS + activation routine as the webhook path, so the pull-based safety
//! net converges with push-based notifications in either arrival order.

use std::sync::Arc;

use crate::application::settlement::{self, PaidOutcome};
use crate::domain::foundation::PaymentId;
use crate::domain::payment::{OrderStatus, PaidFields, PaymentError, PaymentOrder, TradeStatus};
use crate::ports::{
    CasOutcome, MembershipStore, OrderRepository, PaymentGateway, PlanCatalog, TradeState,
};

/// Command to query an order.
#[derive(Debug, Clone)]
pub struct QueryOrderCommand {
    pub order_id: PaymentId,
}

/// The merged local/gateway view of an order.
#[derive(Debug, Clone)]
pub struct QueryOrderResult {
    pub order: PaymentOrder,

    /// Set when this query transitioned the order to PAID but entitlement
    /// activation failed; the order stays PAID.
    pub activation_error: Option<String>,
}

/// Handler for order queries.
pub struct QueryOrderHandler {
    orders: Arc<dyn OrderRepository>,
    memberships: Arc<dyn MembershipStore>,
    plans: Arc<dyn PlanCatalog>,
    gateway: Arc<dyn PaymentGateway>,
}

impl QueryOrderHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        memberships: Arc<dyn MembershipStore>,
        plans: Arc<dyn PlanCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            memberships,
            plans,
            gateway,
        }
    }

    pub async fn handle(&self, cmd: QueryOrderCommand) -> Result<QueryOrderResult, PaymentError> {
        let order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        // Terminal local state is authoritative; no gateway call.
        if order.status.is_settled() {
            return Ok(QueryOrderResult {
                order,
                activation_error: None,
            });
        }

        let state = match self.gateway.query_trade(&order.out_trade_no).await {
            Ok(state) => state,
            // The buyer never reached the gateway; still pending.
            Err(error) if error.is_trade_not_found() => {
                return Ok(QueryOrderResult {
                    order,
                    activation_error: None,
                })
            }
            Err(error) => return Err(error.into()),
        };

        let activation_error = self.apply_trade_state(&order, state).await?;

        let order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        Ok(QueryOrderResult {
            order,
            activation_error,
        })
    }

    async fn apply_trade_state(
        &self,
        order: &PaymentOrder,
        state: TradeState,
    ) -> Result<Option<String>, PaymentError> {
        match state.trade_status {
            status @ (TradeStatus::Success | TradeStatus::Finished) => {
                let fields = PaidFields {
                    trade_no: state.trade_no.unwrap_or_default(),
                    trade_status: status.as_str().to_string(),
                    buyer_id: state.buyer_id,
                    buyer_logon_id: state.buyer_logon_id,
                    receipt_amount_cents: state.receipt_amount_cents,
                    pay_time: state.pay_time,
                };
                match settlement::apply_paid(
                    &self.orders,
                    &self.memberships,
                    &self.plans,
                    order,
                    fields,
                )
                .await?
                {
                    PaidOutcome::Applied { activation_error } => Ok(activation_error),
                    PaidOutcome::AlreadyPaid => Ok(None),
                }
            }
            TradeStatus::Closed => {
                if let CasOutcome::NotApplied = self
                    .orders
                    .update_status_if_pending(&order.out_trade_no, OrderStatus::Closed)
                    .await?
                {
                    tracing::warn!(
                        out_trade_no = %order.out_trade_no,
                        "order settled concurrently while applying gateway close"
                    );
                }
                Ok(None)
            }
            TradeStatus::WaitBuyerPay => Ok(None),
            TradeStatus::Unknown(raw) => {
                tracing::warn!(
                    out_trade_no = %order.out_trade_no,
                    trade_status = %raw,
                    "gateway reported an unknown trade status"
                );
                Ok(None)
            }
        }
    }
}
