//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `OrderRepository` - PaymentOrder storage with the CAS paid-transition
//! - `RefundRepository` - PaymentRefund storage with idempotency keys
//! - `NotificationRepository` - Durable webhook audit rows
//! - `MembershipStore` - Atomic membership activation with audit records
//!
//! ## Collaborator Ports
//!
//! - `PaymentGateway` - The external payment provider
//! - `PlanCatalog` - Membership plan metadata (price, days, level)

mod membership_store;
mod notification_repository;
mod order_repository;
mod payment_gateway;
mod plan_catalog;
mod refund_repository;

pub use membership_store::MembershipStore;
pub use notification_repository::NotificationRepository;
pub use order_repository::{CasOutcome, OrderRepository};
pub use payment_gateway::{PagePayRequest, PaymentGateway, RefundCommand, RefundOutcome, TradeState};
pub use plan_catalog::PlanCatalog;
pub use refund_repository::RefundRepository;
