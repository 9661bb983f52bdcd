//! Payment domain module.
//!
//! Covers the order lifecycle state machine, refunds, gateway notification
//! records and the RSA request/webhook signature codec.
//!
//! # Module Structure
//!
//! - `order` - PaymentOrder aggregate and OrderStatus state machine
//! - `refund` - PaymentRefund entity
//! - `notification` - Gateway webhook audit records and wire parsing
//! - `signature` - Canonical string construction and RSA-SHA256 sign/verify
//! - `money` - Integer-cent amount formatting for the wire
//! - `errors` - Payment error taxonomy

mod errors;
mod money;
mod notification;
mod order;
mod refund;
pub mod signature;

pub use errors::{GatewayError, PaymentError};
pub use money::{format_amount, parse_amount};
pub use notification::{
    GatewayNotification, NotificationFields, ProcessStatus, TradeStatus, VerifyStatus,
};
pub use order::{OrderStatus, PaidFields, PaymentOrder};
pub use refund::{PaymentRefund, RefundStatus};
pub use signature::{RsaSigner, RsaVerifier, SignatureError};
