//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `gateway` - the payment provider's signed open API
//! - `postgres` - sqlx-backed persistence
//! - `http` - axum API surface

pub mod gateway;
pub mod http;
pub mod postgres;
