//! DeleteOrderHandler - Command handler for soft-deleting an order.
//!
//! Ownership-checked; deletion hides the order from the user's listings
//! and never alters lifecycle status.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, Timestamp, UserId};
use crate::domain::payment::PaymentError;
use crate::ports::OrderRepository;

/// Command to soft-delete an order.
#[derive(Debug, Clone)]
pub struct DeleteOrderCommand {
    pub order_id: PaymentId,
    pub requesting_user: UserId,
}

/// Handler for order deletion.
pub struct DeleteOrderHandler {
    orders: Arc<dyn OrderRepository>,
}

impl DeleteOrderHandler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    pub async fn handle(&self, cmd: DeleteOrderCommand) -> Result<(), PaymentError> {
        let mut order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .filter(|o| !o.is_deleted())
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        if order.user_id != cmd.requesting_user {
            return Err(PaymentError::Forbidden {
                order_ref: order.id.to_string(),
            });
        }

        order.soft_delete(Timestamp::now());
        self.orders.update(&order).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{paid_fields_fixture, pending_order, InMemoryOrders};
    use crate::domain::payment::OrderStatus;

    #[tokio::test]
    async fn owner_can_soft_delete_without_touching_status() {
        let orders = Arc::new(InMemoryOrders::new());
        let mut order = pending_order(8800, None);
        order.mark_paid(paid_fields_fixture()).unwrap();
        orders.insert(&order).await.unwrap();
        let handler = DeleteOrderHandler::new(orders.clone());

        handler
            .handle(DeleteOrderCommand {
                order_id: order.id,
                requesting_user: order.user_id,
            })
            .await
            .unwrap();

        let stored = orders.get(&order.id).await.unwrap();
        assert!(stored.is_deleted());
        assert_eq!(stored.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let orders = Arc::new(InMemoryOrders::new());
        let order = pending_order(8800, None);
        orders.insert(&order).await.unwrap();
        let handler = DeleteOrderHandler::new(orders.clone());

        let result = handler
            .handle(DeleteOrderCommand {
                order_id: order.id,
                requesting_user: UserId::new(),
            })
            .await;

        assert!(matches!(result, Err(PaymentError::Forbidden { .. })));
        assert!(!orders.get(&order.id).await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let orders = Arc::new(InMemoryOrders::new());
        let order = pending_order(8800, None);
        orders.insert(&order).await.unwrap();
        let handler = DeleteOrderHandler::new(orders);
        let cmd = DeleteOrderCommand {
            order_id: order.id,
            requesting_user: order.user_id,
        };

        handler.handle(cmd.clone()).await.unwrap();
        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(PaymentError::OrderNotFound { .. })));
    }
}
