//! CancelOrderHandler - Command handler for cancelling a PENDING order.
//!
//! The gateway is called first: its effect is irreversible and
//! authoritative. A failed local write afterwards is a reconciliation gap
//! to be logged, not a reason to pretend the cancellation did not happen.

use std::sync::Arc;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::{OrderStatus, PaymentError};
use crate::ports::{CasOutcome, OrderRepository, PaymentGateway};

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrderCommand {
    pub order_id: PaymentId,
}

/// Result of a cancellation.
#[derive(Debug, Clone)]
pub struct CancelOrderResult {
    pub order_id: PaymentId,
    /// False when the local write failed or lost a race; the gateway-side
    /// cancellation stands either way.
    pub local_status_updated: bool,
}

/// Handler for order cancellation.
pub struct CancelOrderHandler {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CancelOrderHandler {
    pub fn new(orders: Arc<dyn OrderRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, gateway }
    }

    pub async fn handle(&self, cmd: CancelOrderCommand) -> Result<CancelOrderResult, PaymentError> {
        let order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .filter(|o| !o.is_deleted())
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        // Only PENDING orders may be cancelled; the gateway is never
        // invoked for settled orders.
        if order.status != OrderStatus::Pending {
            return Err(PaymentError::invalid_state(
                order.id.to_string(),
                order.status.as_str(),
                OrderStatus::Pending.as_str(),
            ));
        }

        // Gateway first. A trade the provider never saw counts as
        // cancelled.
        match self.gateway.cancel_trade(&order.out_trade_no).await {
            Ok(()) => {}
            Err(error) if error.is_trade_not_found() => {}
            Err(error) => return Err(error.into()),
        }

        let local_status_updated = match self
            .orders
            .update_status_if_pending(&order.out_trade_no, OrderStatus::Cancelled)
            .await
        {
            Ok(CasOutcome::Applied) => true,
            Ok(CasOutcome::NotApplied) => {
                tracing::warn!(
                    order_id = %order.id,
                    out_trade_no = %order.out_trade_no,
                    "order settled concurrently during cancel; gateway-side cancel stands"
                );
                false
            }
            Err(error) => {
                tracing::error!(
                    order_id = %order.id,
                    out_trade_no = %order.out_trade_no,
                    error = %error,
                    "local write failed after gateway cancel; reconciliation gap"
                );
                false
            }
        };

        Ok(CancelOrderResult {
            order_id: order.id,
            local_status_updated,
        })
    }
}
