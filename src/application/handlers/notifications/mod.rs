//! Gateway notification handlers.

mod handle_gateway_notification;

pub use handle_gateway_notification::{
    HandleGatewayNotificationCommand, HandleGatewayNotificationHandler, HandleNotificationResult,
    NotificationDisposition,
};
