//! CloseOrderHandler - Command handler for closing a PENDING order.
//!
//! Mirrors cancellation: gateway first, local CAS second, local-write
//! failures demoted to logged reconciliation gaps.

use std::sync::Arc;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::{OrderStatus, PaymentError};
use crate::ports::{CasOutcome, OrderRepository, PaymentGateway};

/// Command to close an order.
#[derive(Debug, Clone)]
pub struct CloseOrderCommand {
    pub order_id: PaymentId,
}

/// Result of a close.
#[derive(Debug, Clone)]
pub struct CloseOrderResult {
    pub order_id: PaymentId,
    /// False when the local write failed or lost a race; the gateway-side
    /// close stands either way.
    pub local_status_updated: bool,
}

/// Handler for closing orders.
pub struct CloseOrderHandler {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CloseOrderHandler {
    pub fn new(orders: Arc<dyn OrderRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, gateway }
    }

    pub async fn handle(&self, cmd: CloseOrderCommand) -> Result<CloseOrderResult, PaymentError> {
        let order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .filter(|o| !o.is_deleted())
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        if order.status != OrderStatus::Pending {
            return Err(PaymentError::invalid_state(
                order.id.to_string(),
                order.status.as_str(),
                OrderStatus::Pending.as_str(),
            ));
        }

        match self.gateway.close_trade(&order.out_trade_no).await {
            Ok(()) => {}
            Err(error) if error.is_trade_not_found() => {}
            Err(error) => return Err(error.into()),
        }

        let local_status_updated = match self
            .orders
            .update_status_if_pending(&order.out_trade_no, OrderStatus::Closed)
            .await
        {
            Ok(CasOutcome::Applied) => true,
            Ok(CasOutcome::NotApplied) => {
                tracing::warn!(
                    order_id = %order.id,
                    out_trade_no = %order.out_trade_no,
                    "order settled concurrently during close; gateway-side close stands"
                );
                false
            }
            Err(error) => {
                tracing::error!(
                    order_id = %order.id,
                    out_trade_no = %order.out_trade_no,
                    error = %error,
                    "local write failed after gateway close; reconciliation gap"
                );
                false
            }
        };

        Ok(CloseOrderResult {
            order_id: order.id,
            local_status_updated,
        })
    }
}
