//! Payment gateway configuration

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;

/// Payment gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Application id assigned by the provider
    pub app_id: String,

    /// Gateway API endpoint
    pub endpoint: String,

    /// Merchant RSA private key (PEM or raw base64)
    pub merchant_private_key: SecretString,

    /// Provider RSA public key (PEM or raw base64)
    pub gateway_public_key: String,

    /// Webhook callback URL registered with the provider
    pub notify_url: String,

    /// Browser return URL after payment
    pub return_url: Option<String>,

    /// Product code sent with page-pay orders
    #[serde(default = "default_product_code")]
    pub product_code: String,

    /// Fixed client-side timeout for gateway calls, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Minutes after which a PENDING order is considered stale and
    /// reconciled by polling
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_minutes: u64,

    /// Interval between reconciliation sweeps, in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl GatewayConfig {
    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        use secrecy::ExposeSecret;

        if self.app_id.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_APP_ID"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ValidationError::InvalidGatewayEndpoint);
        }
        if self.merchant_private_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_MERCHANT_PRIVATE_KEY"));
        }
        if self.gateway_public_key.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_PUBLIC_KEY"));
        }
        if self.notify_url.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_NOTIFY_URL"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        if self.pending_timeout_minutes == 0 {
            return Err(ValidationError::InvalidPendingTimeout);
        }
        Ok(())
    }
}

fn default_product_code() -> String {
    "FAST_INSTANT_TRADE_PAY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_pending_timeout() -> u64 {
    30
}

fn default_reconcile_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig {
            app_id: "2021000000000001".to_string(),
            endpoint: "https://gateway.example.com/api".to_string(),
            merchant_private_key: SecretString::new("MIIEvQ...".to_string()),
            gateway_public_key: "MIIBIj...".to_string(),
            notify_url: "https://shop.example.com/webhooks/gateway".to_string(),
            return_url: Some("https://shop.example.com/orders".to_string()),
            product_code: default_product_code(),
            timeout_secs: default_timeout(),
            pending_timeout_minutes: default_pending_timeout(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn missing_app_id_is_rejected() {
        let mut config = valid();
        config.app_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let mut config = valid();
        config.endpoint = "ftp://gateway".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = valid();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(default_timeout(), 30);
    }
}
