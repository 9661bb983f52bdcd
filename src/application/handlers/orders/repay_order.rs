//! RepayOrderHandler - Command handler for retrying payment of a PENDING
//! order.
//!
//! A repay is a retry of the same commercial transaction: same
//! `out_trade_no`, same amount, fresh payment attempt number. No new row
//! is created.

use std::sync::Arc;

use crate::domain::foundation::PaymentId;
use crate::domain::payment::PaymentError;
use crate::ports::{OrderRepository, PagePayRequest, PaymentGateway};

/// Command to retry payment of an order.
#[derive(Debug, Clone)]
pub struct RepayOrderCommand {
    pub order_id: PaymentId,
}

/// Result of a repay.
#[derive(Debug, Clone)]
pub struct RepayOrderResult {
    pub order_id: PaymentId,
    pub payment_no: String,
    pub pay_url: String,
}

/// Handler for payment retries.
pub struct RepayOrderHandler {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RepayOrderHandler {
    pub fn new(orders: Arc<dyn OrderRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, gateway }
    }

    pub async fn handle(&self, cmd: RepayOrderCommand) -> Result<RepayOrderResult, PaymentError> {
        let mut order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .filter(|o| !o.is_deleted())
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        order.begin_repay()?;
        self.orders.update(&order).await?;

        let pay_url = self.gateway.build_pay_url(&PagePayRequest {
            out_trade_no: order.out_trade_no.clone(),
            amount_cents: order.amount_cents,
            subject: order.subject.clone(),
            product_code: order.product_code.clone(),
        })?;

        tracing::info!(
            order_id = %order.id,
            out_trade_no = %order.out_trade_no,
            payment_no = %order.payment_no,
            "payment retry started"
        );

        Ok(RepayOrderResult {
            order_id: order.id,
            payment_no: order.payment_no,
            pay_url,
        })
    }
}
