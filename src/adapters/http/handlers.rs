//! HTTP handlers for the payment endpoints.
//!
//! These handlers connect axum routes to the application layer command
//! handlers. The webhook endpoint answers the provider's literal ack text:
//! `"success"` on logical success, anything else makes the provider
//! redeliver.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::handlers::notifications::{
    HandleGatewayNotificationCommand, HandleGatewayNotificationHandler,
};
use crate::application::handlers::orders::{
    CancelOrderCommand, CancelOrderHandler, CloseOrderCommand, CloseOrderHandler,
    CreateOrderCommand, CreateOrderHandler, DeleteOrderCommand, DeleteOrderHandler,
    QueryOrderCommand, QueryOrderHandler, ReconcilePendingHandler, RepayOrderCommand,
    RepayOrderHandler, RefundOrderCommand, RefundOrderHandler,
};
use crate::domain::foundation::{PaymentId, PlanId, UserId};
use crate::domain::payment::RsaVerifier;
use crate::ports::{
    MembershipStore, NotificationRepository, OrderRepository, PaymentGateway, PlanCatalog,
    RefundRepository,
};

use super::dto::{
    error_to_response, CreateOrderRequest, CreateOrderResponse, ErrorResponse, OrderResponse,
    RefundOrderRequest, RefundOrderResponse, RepayOrderResponse, SettleOrderResponse,
};

/// Provider-mandated webhook acknowledgment bodies.
const ACK_SUCCESS: &str = "success";
const ACK_FAILURE: &str = "failure";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped ports.
#[derive(Clone)]
pub struct PaymentAppState {
    pub orders: Arc<dyn OrderRepository>,
    pub refunds: Arc<dyn RefundRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub memberships: Arc<dyn MembershipStore>,
    pub plans: Arc<dyn PlanCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub webhook_verifier: RsaVerifier,
    pub product_code: String,
    pub pending_timeout_minutes: u64,
}

impl PaymentAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_order_handler(&self) -> CreateOrderHandler {
        CreateOrderHandler::new(
            self.orders.clone(),
            self.memberships.clone(),
            self.plans.clone(),
            self.gateway.clone(),
            self.product_code.clone(),
        )
    }

    pub fn repay_order_handler(&self) -> RepayOrderHandler {
        RepayOrderHandler::new(self.orders.clone(), self.gateway.clone())
    }

    pub fn cancel_order_handler(&self) -> CancelOrderHandler {
        CancelOrderHandler::new(self.orders.clone(), self.gateway.clone())
    }

    pub fn close_order_handler(&self) -> CloseOrderHandler {
        CloseOrderHandler::new(self.orders.clone(), self.gateway.clone())
    }

    pub fn query_order_handler(&self) -> QueryOrderHandler {
        QueryOrderHandler::new(
            self.orders.clone(),
            self.memberships.clone(),
            self.plans.clone(),
            self.gateway.clone(),
        )
    }

    pub fn refund_order_handler(&self) -> RefundOrderHandler {
        RefundOrderHandler::new(
            self.orders.clone(),
            self.refunds.clone(),
            self.gateway.clone(),
        )
    }

    pub fn delete_order_handler(&self) -> DeleteOrderHandler {
        DeleteOrderHandler::new(self.orders.clone())
    }

    pub fn notification_handler(&self) -> HandleGatewayNotificationHandler {
        HandleGatewayNotificationHandler::new(
            self.notifications.clone(),
            self.orders.clone(),
            self.memberships.clone(),
            self.plans.clone(),
            self.webhook_verifier.clone(),
        )
    }

    pub fn reconcile_pending_handler(&self) -> ReconcilePendingHandler {
        ReconcilePendingHandler::new(
            self.orders.clone(),
            self.query_order_handler(),
            self.pending_timeout_minutes,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the request.
///
/// Identity is an upstream collaborator; the gateway service trusts the
/// user id header set by the authenticating proxy.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<UserId>().ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Order Handlers
// ════════════════════════════════════════════════════════════════════════════════

pub async fn create_order(
    State(state): State<PaymentAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    let result = state
        .create_order_handler()
        .handle(CreateOrderCommand {
            user_id: user.user_id,
            amount_cents: request.amount_cents,
            subject: request.subject,
            plan_id: request.plan_id.map(PlanId::from_uuid),
        })
        .await;

    match result {
        Ok(created) => (
            StatusCode::CREATED,
            Json(CreateOrderResponse {
                order_id: *created.order_id.as_uuid(),
                order_sn: created.order_sn,
                out_trade_no: created.out_trade_no,
                pay_url: created.pay_url,
            }),
        )
            .into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn query_order(
    State(state): State<PaymentAppState>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = state
        .query_order_handler()
        .handle(QueryOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
        })
        .await;

    match result {
        Ok(view) => (StatusCode::OK, Json(OrderResponse::from(&view.order))).into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn repay_order(
    State(state): State<PaymentAppState>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = state
        .repay_order_handler()
        .handle(RepayOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
        })
        .await;

    match result {
        Ok(repaid) => (
            StatusCode::OK,
            Json(RepayOrderResponse {
                order_id: *repaid.order_id.as_uuid(),
                payment_no: repaid.payment_no,
                pay_url: repaid.pay_url,
            }),
        )
            .into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn cancel_order(
    State(state): State<PaymentAppState>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = state
        .cancel_order_handler()
        .handle(CancelOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
        })
        .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SettleOrderResponse {
                order_id: *outcome.order_id.as_uuid(),
                local_status_updated: outcome.local_status_updated,
            }),
        )
            .into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn close_order(
    State(state): State<PaymentAppState>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = state
        .close_order_handler()
        .handle(CloseOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
        })
        .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SettleOrderResponse {
                order_id: *outcome.order_id.as_uuid(),
                local_status_updated: outcome.local_status_updated,
            }),
        )
            .into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn refund_order(
    State(state): State<PaymentAppState>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<RefundOrderRequest>,
) -> impl IntoResponse {
    let result = state
        .refund_order_handler()
        .handle(RefundOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
            refund_amount_cents: request.refund_amount_cents,
            reason: request.reason,
            out_request_no: request.out_request_no,
        })
        .await;

    match result {
        Ok(refunded) => (
            StatusCode::OK,
            Json(RefundOrderResponse {
                refund_id: *refunded.refund_id.as_uuid(),
                out_request_no: refunded.out_request_no,
                order_status: refunded.order_status.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn delete_order(
    State(state): State<PaymentAppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> impl IntoResponse {
    let result = state
        .delete_order_handler()
        .handle(DeleteOrderCommand {
            order_id: PaymentId::from_uuid(order_id),
            requesting_user: user.user_id,
        })
        .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => {
            let (status, body) = error_to_response(&error);
            (status, Json(body)).into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// Handles the gateway's server-to-server notification.
///
/// No authentication; the payload's RSA signature is the trust anchor.
/// Anything but the literal `"success"` body makes the provider retry.
pub async fn handle_gateway_webhook(
    State(state): State<PaymentAppState>,
    body: String,
) -> impl IntoResponse {
    match state
        .notification_handler()
        .handle(HandleGatewayNotificationCommand { raw_body: body })
        .await
    {
        Ok(result) => {
            if let Some(error) = &result.activation_error {
                tracing::error!(
                    notification_id = %result.notification_id,
                    error = %error,
                    "webhook acked with activation pending repair"
                );
            }
            (StatusCode::OK, ACK_SUCCESS)
        }
        Err(error) => {
            tracing::warn!(error = %error, "webhook processing failed");
            (StatusCode::OK, ACK_FAILURE)
        }
    }
}
