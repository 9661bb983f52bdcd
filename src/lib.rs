//! Paygate - Payment Order Lifecycle and Gateway Reconciliation
//!
//! This crate implements the payment core of the platform: order creation
//! and lifecycle management against a third-party payment gateway,
//! RSA-signed request/webhook framing, idempotent notification processing,
//! and membership entitlement activation on successful payment.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
