//! Browser redirect flow for the payment page.
//!
//! The page-pay flow is browser-facing: the buyer is sent to a signed URL
//! at the gateway instead of a server-to-server call. The signature covers
//! *all* parameters including `biz_content`; the emitted URL carries every
//! parameter except `biz_content` plus the signature.

use serde_json::json;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::signature::build_canonical_string;
use crate::domain::payment::{format_amount, GatewayError, RsaSigner};
use crate::ports::PagePayRequest;

use super::protocol::{self, methods};

/// Builds the signed payment-page URL for an order.
pub fn build_pay_url(
    endpoint: &str,
    app_id: &str,
    notify_url: &str,
    return_url: Option<&str>,
    signer: &RsaSigner,
    request: &PagePayRequest,
) -> Result<String, GatewayError> {
    let biz_content = json!({
        "out_trade_no": request.out_trade_no,
        "total_amount": format_amount(request.amount_cents),
        "subject": request.subject,
        "product_code": request.product_code,
    })
    .to_string();

    let params = protocol::build_request_params(
        app_id,
        methods::PAGE_PAY,
        Some(notify_url),
        return_url,
        &biz_content,
        Timestamp::now(),
    );

    let sign = signer.sign(&build_canonical_string(&params))?;

    let query: Vec<String> = params
        .iter()
        .filter(|(key, _)| key != "biz_content")
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .chain(std::iter::once(format!(
            "sign={}",
            urlencoding::encode(&sign)
        )))
        .collect();

    Ok(format!("{}?{}", endpoint, query.join("&")))
}
