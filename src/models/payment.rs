use serde::{Deserialize, Serialize};

use super::{de_opt_id, OrderRecord};

/// Response of `POST /payments/request/:orderId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequested {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Gateway callback verification payload. The capitalized field names are
/// the gateway's, passed through the backend unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "Authority")]
    pub authority: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

/// Response of `POST /payments/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub order: Option<OrderRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `GET /zones/validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCheck {
    pub allowed: bool,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Where to send the user after a successful order + payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRedirect {
    pub order_id: String,
    pub payment_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verify_request_uses_gateway_field_names() {
        let request = VerifyPaymentRequest {
            authority: "A0000012345".into(),
            status: "OK".into(),
            order_id: "ord-1".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"Authority": "A0000012345", "Status": "OK", "orderId": "ord-1"})
        );
    }

    #[test]
    fn verify_response_accepts_numeric_ref_id() {
        let response: VerifyPaymentResponse =
            serde_json::from_value(json!({"success": true, "refId": 123456789})).unwrap();
        assert!(response.success);
        assert_eq!(response.ref_id.as_deref(), Some("123456789"));
    }
}
