//! HandleGatewayNotificationHandler - webhook ingestion pipeline.
//!
//! The gateway delivers webhooks at-least-once, possibly duplicated and
//! out of order. The pipeline:
//!
//! 1. persist the raw delivery (verify/process PENDING) before anything
//!    else, so a crash never loses it
//! 2. verify the signature over the canonical string of the raw body;
//!    failure stops here and never touches the order
//! 3. parse the required fields (out_trade_no, normalized trade_status)
//! 4. locate the order; not-found is retryable because the delivery can
//!    race the order's own commit
//! 5. apply the transition through the shared CAS routine; duplicates
//!    no-op, and only the CAS winner activates entitlements
//! 6. record the terminal process status with error detail
//!
//! The HTTP boundary must answer the provider's literal ack text on
//! logical success or the provider retries indefinitely; an activation
//! failure on an already-captured payment is still acked and routed to
//! repair instead.

use std::sync::Arc;

use crate::application::settlement::{self, PaidOutcome};
use crate::domain::foundation::NotificationId;
use crate::domain::payment::signature::build_canonical_string;
use crate::domain::payment::{
    GatewayNotification, NotificationFields, OrderStatus, PaidFields, PaymentError, RsaVerifier,
    TradeStatus,
};
use crate::ports::{
    CasOutcome, MembershipStore, NotificationRepository, OrderRepository, PlanCatalog,
};

/// Command carrying one raw webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleGatewayNotificationCommand {
    /// The form-encoded body exactly as delivered.
    pub raw_body: String,
}

/// What the delivery did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDisposition {
    /// This delivery won the PAID transition.
    Paid,

    /// The order was already PAID; idempotent duplicate.
    AlreadyPaid,

    /// The order moved to (or already was) CLOSED.
    Closed,

    /// Buyer has not paid yet; nothing to do.
    BuyerWaiting,

    /// Unknown trade status; logged only.
    Ignored,

    /// The gateway reports paid but the order settled differently here;
    /// recorded as a reconciliation gap.
    Conflicting,
}

/// Result of processing one delivery.
#[derive(Debug, Clone)]
pub struct HandleNotificationResult {
    pub notification_id: NotificationId,
    pub disposition: NotificationDisposition,

    /// Set when the order was paid but entitlement activation failed.
    pub activation_error: Option<String>,
}

/// Handler for inbound gateway webhooks.
pub struct HandleGatewayNotificationHandler {
    notifications: Arc<dyn NotificationRepository>,
    orders: Arc<dyn OrderRepository>,
    memberships: Arc<dyn MembershipStore>,
    plans: Arc<dyn PlanCatalog>,
    verifier: RsaVerifier,
}

impl HandleGatewayNotificationHandler {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        orders: Arc<dyn OrderRepository>,
        memberships: Arc<dyn MembershipStore>,
        plans: Arc<dyn PlanCatalog>,
        verifier: RsaVerifier,
    ) -> Self {
        Self {
            notifications,
            orders,
            memberships,
            plans,
            verifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleGatewayNotificationCommand,
    ) -> Result<HandleNotificationResult, PaymentError> {
        // Durable first: the row exists before any validation can fail.
        let mut notification = GatewayNotification::received(cmd.raw_body);
        self.notifications.insert(&notification).await?;

        // Signature check over the raw body.
        let Some(sign) = notification.sign.clone() else {
            notification.mark_verify_failed("notification carries no sign field");
            self.persist(&notification).await;
            return Err(PaymentError::SignatureVerification);
        };
        let canonical = build_canonical_string(&notification.pairs());
        if !self.verifier.verify(&canonical, &sign) {
            tracing::warn!(
                notification_id = %notification.id,
                "webhook signature verification failed"
            );
            notification.mark_verify_failed("signature verification failed");
            self.persist(&notification).await;
            return Err(PaymentError::SignatureVerification);
        }
        notification.mark_verified();

        // Required fields.
        let fields = match NotificationFields::from_pairs(&notification.pairs()) {
            Ok(fields) => fields,
            Err(error) => {
                notification.mark_process_failed(error.to_string());
                self.persist(&notification).await;
                return Err(error);
            }
        };

        // The delivery may outrun the order's own commit; not-found is
        // retryable and each redelivery gets a fresh audit row.
        let order = match self
            .orders
            .find_by_out_trade_no(&fields.out_trade_no)
            .await?
        {
            Some(order) => order,
            None => {
                notification.mark_process_failed("order not found; delivery may precede commit");
                self.persist(&notification).await;
                return Err(PaymentError::order_not_found(&fields.out_trade_no));
            }
        };
        notification.link_order(order.id);

        let result = self
            .apply(&mut notification, &order, fields)
            .await;
        self.persist(&notification).await;

        result.map(|(disposition, activation_error)| HandleNotificationResult {
            notification_id: notification.id,
            disposition,
            activation_error,
        })
    }

    async fn apply(
        &self,
        notification: &mut GatewayNotification,
        order: &crate::domain::payment::PaymentOrder,
        fields: NotificationFields,
    ) -> Result<(NotificationDisposition, Option<String>), PaymentError> {
        match &fields.trade_status {
            status if status.is_paid() => {
                if order.status == OrderStatus::Paid {
                    notification.mark_processed();
                    return Ok((NotificationDisposition::AlreadyPaid, None));
                }

                let paid_fields = PaidFields {
                    trade_no: fields.trade_no.clone().unwrap_or_default(),
                    trade_status: status.as_str().to_string(),
                    buyer_id: fields.buyer_id.clone(),
                    buyer_logon_id: fields.buyer_logon_id.clone(),
                    receipt_amount_cents: fields.receipt_amount_cents,
                    pay_time: fields.pay_time,
                };
                match settlement::apply_paid(
                    &self.orders,
                    &self.memberships,
                    &self.plans,
                    order,
                    paid_fields,
                )
                .await
                {
                    Ok(PaidOutcome::Applied { activation_error }) => {
                        match &activation_error {
                            Some(error) => notification.mark_process_failed(error.clone()),
                            None => notification.mark_processed(),
                        }
                        Ok((NotificationDisposition::Paid, activation_error))
                    }
                    Ok(PaidOutcome::AlreadyPaid) => {
                        notification.mark_processed();
                        Ok((NotificationDisposition::AlreadyPaid, None))
                    }
                    Err(PaymentError::Conflict(detail)) => {
                        // Funds are captured; ack so the provider stops
                        // retrying, and leave the gap on record.
                        tracing::error!(
                            out_trade_no = %order.out_trade_no,
                            detail = %detail,
                            "paid webhook conflicts with local terminal status"
                        );
                        notification.mark_process_failed(detail);
                        Ok((NotificationDisposition::Conflicting, None))
                    }
                    Err(error) => {
                        notification.mark_process_failed(error.to_string());
                        Err(error)
                    }
                }
            }
            TradeStatus::Closed => {
                if let CasOutcome::NotApplied = self
                    .orders
                    .update_status_if_pending(&order.out_trade_no, OrderStatus::Closed)
                    .await?
                {
                    tracing::debug!(
                        out_trade_no = %order.out_trade_no,
                        "close webhook for an already settled order"
                    );
                }
                notification.mark_processed();
                Ok((NotificationDisposition::Closed, None))
            }
            TradeStatus::WaitBuyerPay => {
                notification.mark_processed();
                Ok((NotificationDisposition::BuyerWaiting, None))
            }
            TradeStatus::Unknown(raw) => {
                tracing::warn!(
                    out_trade_no = %order.out_trade_no,
                    trade_status = %raw,
                    "webhook carried an unknown trade status"
                );
                notification.mark_processed();
                Ok((NotificationDisposition::Ignored, None))
            }
            // is_paid covered Success/Finished above.
            TradeStatus::Success | TradeStatus::Finished => unreachable!(),
        }
    }

    /// Audit-row updates must never mask the processing outcome.
    async fn persist(&self, notification: &GatewayNotification) {
        if let Err(error) = self.notifications.update(notification).await {
            tracing::error!(
                notification_id = %notification.id,
                error = %error,
                "failed to update notification audit row"
            );
        }
    }
}
