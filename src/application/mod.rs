//! Application layer - Commands and Handlers.
//!
//! Orchestrates domain operations over the ports. Command handlers own the
//! operation-level guards (state checks, idempotency keys, CAS outcomes);
//! the domain owns the arithmetic and the state machine.

pub mod handlers;

mod settlement;

#[cfg(test)]
pub(crate) mod testing;

pub use handlers::membership::{
    ActivateEntitlementCommand, ActivateEntitlementHandler, ActivationResult,
};
pub use handlers::notifications::{
    HandleGatewayNotificationCommand, HandleGatewayNotificationHandler, HandleNotificationResult,
    NotificationDisposition,
};
pub use handlers::orders::{
    CancelOrderCommand, CancelOrderHandler, CancelOrderResult, CloseOrderCommand,
    CloseOrderHandler, CloseOrderResult, CreateOrderCommand, CreateOrderHandler, CreateOrderResult,
    DeleteOrderCommand, DeleteOrderHandler, QueryOrderCommand, QueryOrderHandler, QueryOrderResult,
    ReconcilePendingHandler, ReconcileReport, RepayOrderCommand, RepayOrderHandler,
    RepayOrderResult, RefundOrderCommand, RefundOrderHandler, RefundOrderResult,
};
