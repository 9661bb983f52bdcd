//! ReconcilePendingHandler - Pull-based safety net for lost webhooks.
//!
//! Orders still PENDING past the timeout window are re-driven through the
//! query path, which applies the same CAS + activation routine as the
//! webhook processor. Individual failures are logged and do not stop the
//! sweep.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::ports::OrderRepository;

use super::query_order::{QueryOrderCommand, QueryOrderHandler};

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub resolved: usize,
    pub still_pending: usize,
    pub failed: usize,
}

/// Handler for the reconciliation sweep.
pub struct ReconcilePendingHandler {
    orders: Arc<dyn OrderRepository>,
    query: QueryOrderHandler,
    pending_timeout_minutes: u64,
    batch_limit: u32,
}

impl ReconcilePendingHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        query: QueryOrderHandler,
        pending_timeout_minutes: u64,
    ) -> Self {
        Self {
            orders,
            query,
            pending_timeout_minutes,
            batch_limit: 100,
        }
    }

    pub async fn handle(&self) -> ReconcileReport {
        let cutoff = Timestamp::now().minus_minutes(self.pending_timeout_minutes as i64);
        let stale = match self.orders.find_stale_pending(cutoff, self.batch_limit).await {
            Ok(stale) => stale,
            Err(error) => {
                tracing::error!(error = %error, "reconciliation sweep could not list stale orders");
                return ReconcileReport::default();
            }
        };

        let mut report = ReconcileReport {
            examined: stale.len(),
            ..ReconcileReport::default()
        };

        for order in stale {
            match self
                .query
                .handle(QueryOrderCommand { order_id: order.id })
                .await
            {
                Ok(result) if result.order.status.is_settled() => report.resolved += 1,
                Ok(_) => report.still_pending += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        order_id = %order.id,
                        out_trade_no = %order.out_trade_no,
                        error = %error,
                        "reconciliation query failed"
                    );
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                resolved = report.resolved,
                still_pending = report.still_pending,
                failed = report.failed,
                "reconciliation sweep finished"
            );
        }

        report
    }
}
