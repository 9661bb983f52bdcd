//! HTTP adapter - axum surface for the payment API.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::PaymentAppState;
pub use routes::api_router;
