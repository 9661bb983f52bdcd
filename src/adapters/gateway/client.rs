//! Gateway client adapter.
//!
//! Implements the `PaymentGateway` port over the provider's open API:
//! builds and signs outbound requests, POSTs them form-encoded with a
//! fixed client-side timeout, and decodes the `*_response` envelope.
//!
//! # Configuration
//!
//! ```ignore
//! let client = GatewayClient::new(config.gateway.clone())?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::config::GatewayConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::payment::signature::build_canonical_string;
use crate::domain::payment::{format_amount, GatewayError, RsaSigner, RsaVerifier, SignatureError};
use crate::ports::{PagePayRequest, PaymentGateway, RefundCommand, RefundOutcome, TradeState};

use super::protocol::{self, methods, RefundData, TradeQueryData};
use super::redirect;

/// reqwest-backed gateway client.
pub struct GatewayClient {
    config: GatewayConfig,
    signer: RsaSigner,
    http_client: reqwest::Client,
}

impl GatewayClient {
    /// Creates a client, parsing the merchant key and fixing the HTTP
    /// timeout from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Signing` for unparseable key material and
    /// `GatewayError::Network` when the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let signer = RsaSigner::from_pem(config.merchant_private_key.expose_secret())?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            config,
            signer,
            http_client,
        })
    }

    /// Verifier for inbound webhooks, built from the provider's public key.
    pub fn webhook_verifier(&self) -> Result<RsaVerifier, SignatureError> {
        RsaVerifier::from_pem(&self.config.gateway_public_key)
    }

    /// Signs and POSTs one API call, returning the envelope payload.
    async fn invoke(
        &self,
        method: &str,
        biz_content: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut params = protocol::build_request_params(
            &self.config.app_id,
            method,
            Some(&self.config.notify_url),
            None,
            &biz_content.to_string(),
            Timestamp::now(),
        );
        let sign = self.signer.sign(&build_canonical_string(&params))?;
        params.push(("sign".to_string(), sign));

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let result = protocol::parse_envelope(&body);
        if let Err(error) = &result {
            if let Some(hint) = error.remediation_hint() {
                tracing::warn!(method, error = %error, hint, "gateway call rejected");
            } else {
                tracing::warn!(method, error = %error, "gateway call failed");
            }
        }
        result
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    fn build_pay_url(&self, request: &PagePayRequest) -> Result<String, GatewayError> {
        redirect::build_pay_url(
            &self.config.endpoint,
            &self.config.app_id,
            &self.config.notify_url,
            self.config.return_url.as_deref(),
            &self.signer,
            request,
        )
    }

    async fn query_trade(&self, out_trade_no: &str) -> Result<TradeState, GatewayError> {
        let payload = self
            .invoke(methods::QUERY, json!({ "out_trade_no": out_trade_no }))
            .await?;
        let data: TradeQueryData = serde_json::from_value(payload)
            .map_err(|e| GatewayError::Protocol(format!("bad query payload: {}", e)))?;
        data.into_trade_state()
    }

    async fn close_trade(&self, out_trade_no: &str) -> Result<(), GatewayError> {
        self.invoke(methods::CLOSE, json!({ "out_trade_no": out_trade_no }))
            .await?;
        Ok(())
    }

    async fn cancel_trade(&self, out_trade_no: &str) -> Result<(), GatewayError> {
        self.invoke(methods::CANCEL, json!({ "out_trade_no": out_trade_no }))
            .await?;
        Ok(())
    }

    async fn refund_trade(&self, command: &RefundCommand) -> Result<RefundOutcome, GatewayError> {
        let payload = self
            .invoke(
                methods::REFUND,
                json!({
                    "out_trade_no": command.out_trade_no,
                    "out_request_no": command.out_request_no,
                    "refund_amount": format_amount(command.refund_amount_cents),
                    "refund_reason": command.reason,
                }),
            )
            .await?;
        let data: RefundData = serde_json::from_value(payload)
            .map_err(|e| GatewayError::Protocol(format!("bad refund payload: {}", e)))?;

        let refund_fee_cents = match data.refund_fee.as_deref() {
            Some(raw) => Some(crate::domain::payment::parse_amount(raw).map_err(|_| {
                GatewayError::Protocol(format!("unparseable refund_fee '{}'", raw))
            })?),
            None => None,
        };

        Ok(RefundOutcome {
            refund_fee_cents,
            refund_status: data.refund_status,
        })
    }
}
