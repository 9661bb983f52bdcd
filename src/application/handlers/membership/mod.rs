//! Membership command handlers.

mod activate_entitlement;

pub use activate_entitlement::{
    ActivateEntitlementCommand, ActivateEntitlementHandler, ActivationResult,
};
