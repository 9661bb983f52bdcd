//! RefundOrderHandler - Command handler for refunding a PAID order.
//!
//! `out_request_no` is the idempotency key: the pre-check catches
//! duplicates cheaply and the unique constraint catches races. A full
//! refund settles the order to REFUNDED, a partial one to
//! PARTIAL_REFUNDED.

use std::sync::Arc;

use crate::domain::foundation::{PaymentId, RefundId};
use crate::domain::payment::{OrderStatus, PaymentError, PaymentRefund};
use crate::ports::{OrderRepository, PaymentGateway, RefundCommand, RefundRepository};

/// Command to refund (part of) an order.
#[derive(Debug, Clone)]
pub struct RefundOrderCommand {
    pub order_id: PaymentId,
    pub refund_amount_cents: i64,
    pub reason: String,
    /// Idempotency key; generated when absent.
    pub out_request_no: Option<String>,
}

/// Result of a refund.
#[derive(Debug, Clone)]
pub struct RefundOrderResult {
    pub refund_id: RefundId,
    pub out_request_no: String,
    pub order_status: OrderStatus,
}

/// Handler for refunds.
pub struct RefundOrderHandler {
    orders: Arc<dyn OrderRepository>,
    refunds: Arc<dyn RefundRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundOrderHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        refunds: Arc<dyn RefundRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            refunds,
            gateway,
        }
    }

    pub async fn handle(&self, cmd: RefundOrderCommand) -> Result<RefundOrderResult, PaymentError> {
        let mut order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .ok_or_else(|| PaymentError::order_not_found(cmd.order_id.to_string()))?;

        if order.status != OrderStatus::Paid {
            return Err(PaymentError::invalid_state(
                order.id.to_string(),
                order.status.as_str(),
                OrderStatus::Paid.as_str(),
            ));
        }
        if cmd.refund_amount_cents <= 0 {
            return Err(PaymentError::validation(
                "refund_amount",
                format!("must be positive, got {}", cmd.refund_amount_cents),
            ));
        }
        if cmd.refund_amount_cents > order.amount_cents {
            return Err(PaymentError::RefundExceedsOrder {
                requested: cmd.refund_amount_cents,
                available: order.amount_cents,
            });
        }

        let out_request_no = cmd
            .out_request_no
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        if self
            .refunds
            .find_by_out_request_no(&out_request_no)
            .await?
            .is_some()
        {
            return Err(PaymentError::DuplicateRefundRequest { out_request_no });
        }

        let mut refund = PaymentRefund::new(
            order.id,
            out_request_no.clone(),
            cmd.refund_amount_cents,
            cmd.reason.clone(),
        );
        // The unique constraint on out_request_no backstops the pre-check
        // under concurrent duplicates.
        self.refunds.insert(&refund).await.map_err(|error| {
            if error.code == crate::domain::foundation::ErrorCode::DuplicateKey {
                PaymentError::DuplicateRefundRequest {
                    out_request_no: out_request_no.clone(),
                }
            } else {
                error.into()
            }
        })?;

        let outcome = match self
            .gateway
            .refund_trade(&RefundCommand {
                out_trade_no: order.out_trade_no.clone(),
                out_request_no: out_request_no.clone(),
                refund_amount_cents: cmd.refund_amount_cents,
                reason: cmd.reason,
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                refund.mark_failed(None);
                if let Err(persist_error) = self.refunds.update(&refund).await {
                    tracing::error!(
                        refund_id = %refund.id,
                        error = %persist_error,
                        "failed to record refund rejection"
                    );
                }
                return Err(error.into());
            }
        };

        refund.mark_succeeded(outcome.refund_fee_cents, outcome.refund_status);
        self.refunds.update(&refund).await?;

        order.apply_refund(cmd.refund_amount_cents)?;
        if let Err(error) = self.orders.update(&order).await {
            // The gateway refund is irreversible; surface the gap, keep
            // the refund result.
            tracing::error!(
                order_id = %order.id,
                out_request_no = %out_request_no,
                error = %error,
                "local write failed after gateway refund; reconciliation gap"
            );
        }

        tracing::info!(
            order_id = %order.id,
            refund_id = %refund.id,
            out_request_no = %out_request_no,
            refund_amount_cents = cmd.refund_amount_cents,
            order_status = order.status.as_str(),
            "refund accepted"
        );

        Ok(RefundOrderResult {
            refund_id: refund.id,
            out_request_no,
            order_status: order.status,
        })
    }
}
