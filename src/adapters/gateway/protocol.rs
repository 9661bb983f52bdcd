//! Gateway wire protocol: request assembly and envelope decoding.
//!
//! Requests are form-encoded key/value sets signed over the canonical
//! string of *all* parameters (biz_content included). Responses nest the
//! payload under a `<method>_response` key, with `code == "10000"` meaning
//! success.

use serde::Deserialize;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{parse_amount, GatewayError, TradeStatus};
use crate::ports::TradeState;

/// Gateway API method names.
pub mod methods {
    pub const PAGE_PAY: &str = "trade.page.pay";
    pub const QUERY: &str = "trade.query";
    pub const CLOSE: &str = "trade.close";
    pub const CANCEL: &str = "trade.cancel";
    pub const REFUND: &str = "trade.refund";
}

pub const SUCCESS_CODE: &str = "10000";

const FORMAT: &str = "JSON";
const CHARSET: &str = "utf-8";
const SIGN_TYPE: &str = "RSA2";
const VERSION: &str = "1.0";

/// Assembles the common request parameter set, unsigned.
///
/// Parameter order is irrelevant to the signature (the canonical string
/// sorts), but kept stable for log readability.
pub fn build_request_params(
    app_id: &str,
    method: &str,
    notify_url: Option<&str>,
    return_url: Option<&str>,
    biz_content: &str,
    now: Timestamp,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("app_id".to_string(), app_id.to_string()),
        ("method".to_string(), method.to_string()),
        ("format".to_string(), FORMAT.to_string()),
        ("charset".to_string(), CHARSET.to_string()),
        ("sign_type".to_string(), SIGN_TYPE.to_string()),
        ("timestamp".to_string(), now.to_wire_format()),
        ("version".to_string(), VERSION.to_string()),
    ];
    if let Some(url) = notify_url {
        params.push(("notify_url".to_string(), url.to_string()));
    }
    if let Some(url) = return_url {
        params.push(("return_url".to_string(), url.to_string()));
    }
    params.push(("biz_content".to_string(), biz_content.to_string()));
    params
}

/// Locates the `*_response` envelope and decodes the outcome.
///
/// Returns the inner payload object on success; a non-"10000" code becomes
/// a `GatewayError::Api` carrying code and sub_code.
pub fn parse_envelope(body: &str) -> Result<serde_json::Value, GatewayError> {
    let root: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::Protocol(format!("invalid JSON body: {}", e)))?;
    let object = root
        .as_object()
        .ok_or_else(|| GatewayError::Protocol("response body is not an object".to_string()))?;

    let inner = object
        .iter()
        .find(|(key, _)| key.ends_with("_response"))
        .map(|(_, value)| value)
        .ok_or_else(|| GatewayError::Protocol("no *_response envelope key".to_string()))?;

    let code = inner
        .get("code")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::Protocol("envelope missing code".to_string()))?;

    if code != SUCCESS_CODE {
        let message = inner
            .get("sub_msg")
            .or_else(|| inner.get("msg"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown gateway failure")
            .to_string();
        let mut error = GatewayError::api(code, message);
        if let Some(sub_code) = inner.get("sub_code").and_then(|v| v.as_str()) {
            error = error.with_sub_code(sub_code);
        }
        return Err(error);
    }

    Ok(inner.clone())
}

/// Trade query payload fields we consume.
#[derive(Debug, Deserialize)]
pub struct TradeQueryData {
    pub trade_status: Option<String>,
    pub trade_no: Option<String>,
    pub buyer_user_id: Option<String>,
    pub buyer_logon_id: Option<String>,
    pub receipt_amount: Option<String>,
    pub send_pay_date: Option<String>,
}

impl TradeQueryData {
    /// Decodes the envelope payload into the port's trade state.
    pub fn into_trade_state(self) -> Result<TradeState, GatewayError> {
        let raw_status = self
            .trade_status
            .ok_or_else(|| GatewayError::Protocol("query payload missing trade_status".to_string()))?;

        let receipt_amount_cents = match self.receipt_amount.as_deref() {
            Some(raw) => Some(parse_amount(raw).map_err(|_| {
                GatewayError::Protocol(format!("unparseable receipt_amount '{}'", raw))
            })?),
            None => None,
        };

        Ok(TradeState {
            trade_status: TradeStatus::parse(&raw_status),
            trade_no: self.trade_no,
            buyer_id: self.buyer_user_id,
            buyer_logon_id: self.buyer_logon_id,
            receipt_amount_cents,
            pay_time: self
                .send_pay_date
                .as_deref()
                .and_then(Timestamp::parse_wire_format),
        })
    }
}

/// Refund payload fields we consume.
#[derive(Debug, Deserialize)]
pub struct RefundData {
    pub refund_fee: Option<String>,
    pub refund_status: Option<String>,
}
