//! Axum router configuration for payment endpoints.
//!
//! # Routes
//!
//! ## Order Endpoints (require authentication)
//! - `POST /orders` - Create an order and get the payment URL
//! - `GET /orders/:id` - Query the merged local/gateway order view
//! - `POST /orders/:id/repay` - Retry payment of a PENDING order
//! - `POST /orders/:id/cancel` - Cancel a PENDING order
//! - `POST /orders/:id/close` - Close a PENDING order
//! - `POST /orders/:id/refund` - Refund a PAID order
//! - `DELETE /orders/:id` - Soft-delete an order
//!
//! ## Webhook Endpoints (no auth, signature verified)
//! - `POST /webhooks/gateway` - Gateway payment notifications

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_order, close_order, create_order, delete_order, handle_gateway_webhook, query_order,
    refund_order, repay_order, PaymentAppState,
};

/// Create the order API router.
pub fn order_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/:id", get(query_order).delete(delete_order))
        .route("/:id/repay", post(repay_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/close", post(close_order))
        .route("/:id/refund", post(refund_order))
}

/// Create the webhook router.
///
/// Separate from the order routes because webhooks carry no user
/// authentication; the payload signature is verified instead.
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new().route("/gateway", post(handle_gateway_webhook))
}

/// Create the complete payment API router.
pub fn api_router() -> Router<PaymentAppState> {
    Router::new()
        .nest("/orders", order_routes())
        .nest("/webhooks", webhook_routes())
}
