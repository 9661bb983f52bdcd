//! Gateway adapter - the external payment provider's protocol.
//!
//! - `protocol` - request assembly and response envelope decoding
//! - `client` - reqwest-backed implementation of the PaymentGateway port
//! - `redirect` - signed browser redirect URL for the payment page

pub mod client;
pub mod protocol;
pub mod redirect;

pub use client::GatewayClient;
