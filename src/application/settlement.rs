//! Shared paid-transition routine.
//!
//! The push path (webhook) and the pull path (trade query/reconciliation)
//! race each other for the same order with no ordering guarantee. Both
//! funnel through this routine: a compare-and-swap PAID write that only
//! the winner follows with entitlement activation, so duplicate deliveries
//! and concurrent queries converge to exactly one transition and at most
//! one activation.

use std::sync::Arc;

use crate::application::handlers::membership::{
    ActivateEntitlementCommand, ActivateEntitlementHandler,
};
use crate::domain::payment::{PaidFields, PaymentError, PaymentOrder};
use crate::ports::{CasOutcome, MembershipStore, OrderRepository, PlanCatalog};

/// How a paid signal was applied to the local order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PaidOutcome {
    /// This caller won the PAID transition.
    ///
    /// `activation_error` is set when the order purchased a plan and
    /// activation failed; the order stays PAID regardless.
    Applied { activation_error: Option<String> },

    /// The order was already PAID; idempotent no-op.
    AlreadyPaid,
}

/// Applies a gateway-confirmed payment to the order.
///
/// # Errors
///
/// - `Conflict` when the order settled to a non-PAID terminal state first
///   (gateway captured funds for a locally closed order), recorded as a
///   reconciliation gap
/// - `Persistence` when storage fails
pub(crate) async fn apply_paid(
    orders: &Arc<dyn OrderRepository>,
    memberships: &Arc<dyn MembershipStore>,
    plans: &Arc<dyn PlanCatalog>,
    order: &PaymentOrder,
    fields: PaidFields,
) -> Result<PaidOutcome, PaymentError> {
    let cas = orders
        .mark_paid_if_pending(&order.out_trade_no, &fields)
        .await?;

    match cas {
        CasOutcome::NotApplied => {
            // Lost the race or the order was never PENDING; re-read to
            // tell idempotent duplicates from genuine conflicts.
            let current = orders
                .find_by_out_trade_no(&order.out_trade_no)
                .await?
                .ok_or_else(|| PaymentError::order_not_found(&order.out_trade_no))?;

            if current.status == crate::domain::payment::OrderStatus::Paid {
                return Ok(PaidOutcome::AlreadyPaid);
            }

            Err(PaymentError::Conflict(format!(
                "order {} is {} but the gateway reports it paid",
                order.out_trade_no,
                current.status.as_str()
            )))
        }
        CasOutcome::Applied => {
            let activation_error = match order.plan_id {
                None => None,
                Some(plan_id) => {
                    let activator =
                        ActivateEntitlementHandler::new(memberships.clone(), plans.clone());
                    match activator
                        .handle(ActivateEntitlementCommand {
                            user_id: order.user_id,
                            plan_id,
                            order_id: order.id,
                            amount_cents: order.amount_cents,
                        })
                        .await
                    {
                        Ok(_) => None,
                        Err(error) => {
                            // The gateway captured funds; PAID stands and
                            // the failure goes to out-of-band repair.
                            tracing::error!(
                                order_id = %order.id,
                                out_trade_no = %order.out_trade_no,
                                error = %error,
                                "entitlement activation failed for paid order"
                            );
                            Some(error.to_string())
                        }
                    }
                }
            };
            Ok(PaidOutcome::Applied { activation_error })
        }
    }
}
