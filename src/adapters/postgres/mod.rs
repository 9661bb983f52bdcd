//! PostgreSQL implementations of the persistence ports.

mod membership_store;
mod notification_repository;
mod order_repository;
mod plan_catalog;
mod refund_repository;

pub use membership_store::PostgresMembershipStore;
pub use notification_repository::PostgresNotificationRepository;
pub use order_repository::PostgresOrderRepository;
pub use plan_catalog::PostgresPlanCatalog;
pub use refund_repository::PostgresRefundRepository;
