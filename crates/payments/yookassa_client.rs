use std::collections::HashMap;

use anyhow::{Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_API_BASE: &str = "https://api.yookassa.ru/v3";

/// Minimal YooKassa v3 client built on reqwest.
pub struct YooKassaClient {
    http: reqwest::Client,
    api_base: String,
    shop_id: String,
    secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardInfo {
    pub first6: Option<String>,
    pub last4: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayPaymentMethod {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: Option<String>,
    #[serde(default)]
    pub saved: bool,
    pub title: Option<String>,
    pub card: Option<CardInfo>,
}

impl GatewayPaymentMethod {
    /// The gateway does not always flag a reusable method as `saved`; a card
    /// with its id and type, or a wallet with an id, can still be charged.
    pub fn is_reusable(&self) -> bool {
        if self.saved {
            return true;
        }
        let has_id = self.id.as_deref().is_some_and(|id| !id.is_empty());
        (self.card.is_some() && has_id && !self.type_.is_empty())
            || (self.type_ == "yoo_money" && has_id)
    }
}

/// A payment object as returned by `/payments` endpoints and webhooks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub amount: Amount,
    pub description: Option<String>,
    pub confirmation: Option<Confirmation>,
    pub payment_method: Option<GatewayPaymentMethod>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub payment_method_saved: bool,
    pub captured_at: Option<String>,
}

impl GatewayPayment {
    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation
            .as_ref()
            .and_then(|confirmation| confirmation.confirmation_url.as_deref())
    }

    /// The method to persist, if the payer allowed reuse.
    pub fn reusable_method(&self) -> Option<&GatewayPaymentMethod> {
        self.payment_method
            .as_ref()
            .filter(|method| self.payment_method_saved || method.is_reusable())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePaymentRequest {
    pub amount: Amount,
    pub capture: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    pub description: String,
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_payment_method: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub event: Option<String>,
    pub object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct YooKassaErrorBody {
    #[serde(rename = "type")]
    type_: Option<String>,
    id: Option<String>,
    code: Option<String>,
    description: Option<String>,
    parameter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("payment {0} not found at gateway")]
pub struct PaymentNotFound(pub String);

#[derive(Debug, thiserror::Error)]
#[error("invalid webhook signature")]
pub struct InvalidWebhookSignature;

impl YooKassaClient {
    pub fn new(shop_id: String, secret_key: String) -> Self {
        Self::with_api_base(shop_id, secret_key, DEFAULT_API_BASE.to_string())
    }

    pub fn with_api_base(shop_id: String, secret_key: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            shop_id,
            secret_key,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<YooKassaErrorBody>(&body).ok();
        let (error_type, error_id, error_code, error_description, error_parameter) = match details
        {
            Some(details) => (
                details.type_,
                details.id,
                details.code,
                details.description,
                details.parameter,
            ),
            None => (None, None, None, None, None),
        };

        error!(
            status = %status,
            yookassa_error_type = ?error_type,
            yookassa_error_id = ?error_id,
            yookassa_error_code = ?error_code,
            yookassa_error_description = ?error_description,
            yookassa_error_parameter = ?error_parameter,
            response_body = %body,
            context = %context,
            "yookassa api request failed"
        );

        bail!(
            "YooKassa API request failed: {} (status {}, code={:?})",
            context,
            status,
            error_code
        );
    }

    /// POST /payments. The idempotence key makes retries of the same call safe.
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        idempotence_key: Uuid,
    ) -> Result<GatewayPayment> {
        let resp = self
            .http
            .post(format!("{}/payments", self.api_base))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", idempotence_key.to_string())
            .json(request)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment").await?;

        Ok(resp.json().await?)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        let resp = self
            .http
            .get(format!("{}/payments/{}", self.api_base, payment_id))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(PaymentNotFound(payment_id.to_string()).into());
        }
        let resp = Self::ensure_success(resp, "get payment").await?;

        Ok(resp.json().await?)
    }

    /// Second step of a two-step payment. Captures the full amount when
    /// `amount` is `None`.
    pub async fn capture_payment(
        &self,
        payment_id: &str,
        amount: Option<Amount>,
        idempotence_key: Uuid,
    ) -> Result<GatewayPayment> {
        let body = match amount {
            Some(amount) => serde_json::json!({ "amount": amount }),
            None => serde_json::json!({}),
        };

        let resp = self
            .http
            .post(format!("{}/payments/{}/capture", self.api_base, payment_id))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", idempotence_key.to_string())
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "capture payment").await?;

        Ok(resp.json().await?)
    }

    /// Checks `signature` (base64 HMAC-SHA256 of the raw body keyed with the
    /// secret key) and parses the notification.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookNotification> {
        let provided = BASE64
            .decode(signature.trim())
            .map_err(|_| InvalidWebhookSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())?;
        mac.update(payload);
        mac.verify_slice(&provided)
            .map_err(|_| InvalidWebhookSignature)?;

        let notification: WebhookNotification = serde_json::from_slice(payload)?;
        Ok(notification)
    }
}
