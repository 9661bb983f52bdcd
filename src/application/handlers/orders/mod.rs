//! Order lifecycle command handlers.
//!
//! One command/handler pair per operation: create, repay, cancel, close,
//! query, refund, delete and the stale-pending reconciliation sweep.

mod cancel_order;
mod close_order;
mod create_order;
mod delete_order;
mod query_order;
mod reconcile_pending;
mod repay_order;
mod refund_order;

pub use cancel_order::{CancelOrderCommand, CancelOrderHandler, CancelOrderResult};
pub use close_order::{CloseOrderCommand, CloseOrderHandler, CloseOrderResult};
pub use create_order::{CreateOrderCommand, CreateOrderHandler, CreateOrderResult};
pub use delete_order::{DeleteOrderCommand, DeleteOrderHandler};
pub use query_order::{QueryOrderCommand, QueryOrderHandler, QueryOrderResult};
pub use reconcile_pending::{ReconcilePendingHandler, ReconcileReport};
pub use repay_order::{RepayOrderCommand, RepayOrderHandler, RepayOrderResult};
pub use refund_order::{RefundOrderCommand, RefundOrderHandler, RefundOrderResult};
