use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    Amount, PaymentState, ProviderName, Settlement, WebhookEvent, WebhookVerificationResult,
};
use crate::payments::utils::{
    verify_hmac_sha256_hex, PaymentHttpClient, ProviderAuth, RequestBody,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const PROVIDER: &str = "hitpay";
const SIGNATURE_HEADER: &str = "hitpay-signature";

#[derive(Debug, Clone)]
pub struct HitPayConfig {
    pub api_key: String,
    pub api_url: String,
    pub webhook_salt: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HitPayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.hit-pay.com/v1/payment-requests".to_string(),
            webhook_salt: None,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl HitPayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key = std::env::var("HITPAY_API_KEY").map_err(|_| {
            PaymentError::validation(
                "HITPAY_API_KEY environment variable is required",
                "HITPAY_API_KEY",
            )
        })?;

        Ok(Self {
            api_url: std::env::var("HITPAY_API_URL")
                .unwrap_or_else(|_| "https://api.hit-pay.com/v1/payment-requests".to_string()),
            webhook_salt: std::env::var("HITPAY_WEBHOOK_SALT").ok(),
            timeout_secs: std::env::var("HITPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("HITPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            api_key,
        })
    }
}

/// QR payment methods offered through HitPay. Amounts are in major units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrMethod {
    PromptPay,
    PayNow,
}

impl QrMethod {
    pub fn payment_method(&self) -> &'static str {
        match self {
            QrMethod::PromptPay => "opn_prompt_pay",
            QrMethod::PayNow => "paynow_online",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            QrMethod::PromptPay => "THB",
            QrMethod::PayNow => "sgd",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            QrMethod::PromptPay => "Failed to create payment request for PromptPay with HitPay.",
            QrMethod::PayNow => "Failed to create payment request for PayNow with HitPay.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HitPayQr {
    pub id: String,
    pub qr_code_data: JsonValue,
    pub status: Option<String>,
    pub amount: JsonValue,
}

#[derive(Debug, Deserialize)]
struct HitPayPaymentRequest {
    id: String,
    #[serde(default)]
    qr_code_data: JsonValue,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: JsonValue,
}

pub struct HitPayProvider {
    config: HitPayConfig,
    http: PaymentHttpClient,
}

impl HitPayProvider {
    pub fn new(config: HitPayConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(HitPayConfig::from_env()?)
    }

    /// Creates a payment request with a generated QR code.
    ///
    /// The user id travels as `name` and the currency id as `reference_number`;
    /// the webhook reads them back from the same fields.
    pub async fn create_qr_payment(
        &self,
        amount: &Amount,
        method: QrMethod,
        payni_user_id: Option<&str>,
        currency_id: Option<&str>,
    ) -> PaymentResult<HitPayQr> {
        let mut payload = serde_json::json!({
            "amount": amount.to_string(),
            "currency": method.currency(),
            "payment_methods": [method.payment_method()],
            "generate_qr": true,
        });
        if let Some(fields) = payload.as_object_mut() {
            if let Some(user) = payni_user_id {
                fields.insert("name".to_string(), JsonValue::from(user));
            }
            if let Some(currency) = currency_id {
                fields.insert("reference_number".to_string(), JsonValue::from(currency));
            }
        }

        let operation = format!("POST payment-requests ({})", method.payment_method());
        let raw: HitPayPaymentRequest = log_external_call(PROVIDER, &operation, async {
            self.http
                .request_json_or(
                    Method::POST,
                    &self.config.api_url,
                    ProviderAuth::Headers,
                    RequestBody::Json(&payload),
                    &[
                        ("X-BUSINESS-API-KEY", self.config.api_key.as_str()),
                        ("X-Requested-With", "XMLHttpRequest"),
                    ],
                    method.failure_message(),
                )
                .await
                .map_err(|e| e.for_provider(PROVIDER))
        })
        .await?;

        info!(
            payment_request = %raw.id,
            method = method.payment_method(),
            "hitpay QR payment request created"
        );

        Ok(HitPayQr {
            id: raw.id,
            qr_code_data: raw.qr_code_data,
            status: raw.status,
            amount: raw.amount,
        })
    }
}

fn payment_state(status: &str) -> PaymentState {
    match status {
        "completed" | "succeeded" => PaymentState::Success,
        "pending" => PaymentState::Pending,
        "failed" | "expired" | "canceled" => PaymentState::Failed,
        _ => PaymentState::Unknown,
    }
}

#[async_trait]
impl PaymentProvider for HitPayProvider {
    fn name(&self) -> ProviderName {
        ProviderName::HitPay
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some(SIGNATURE_HEADER)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookVerificationResult> {
        let signature = match signature.map(str::trim) {
            Some(sig) if !sig.is_empty() && !payload.is_empty() => sig,
            _ => {
                return Ok(WebhookVerificationResult::invalid(
                    "missing signature or raw body",
                ))
            }
        };
        let Some(salt) = self.config.webhook_salt.as_deref() else {
            return Ok(WebhookVerificationResult::invalid(
                "HITPAY_WEBHOOK_SALT is not configured",
            ));
        };

        if verify_hmac_sha256_hex(payload, salt, signature) {
            Ok(WebhookVerificationResult::valid())
        } else {
            Ok(WebhookVerificationResult::invalid(
                "invalid hitpay signature",
            ))
        }
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let raw_status = parsed
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let status = payment_state(&raw_status);

        let settlement = if raw_status == "completed" {
            let id = parsed.get("id").and_then(|v| v.as_str());
            let amount = parsed.get("amount").and_then(|v| match v {
                JsonValue::String(s) => BigDecimal::from_str(s.trim()).ok(),
                JsonValue::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
                _ => None,
            });
            match (id, amount) {
                (Some(id), Some(amount)) => Some(Settlement {
                    transaction_id: id.to_string(),
                    amount,
                    payni_user_id: parsed
                        .get("name")
                        .and_then(crate::payments::types::json_text),
                    currency_id: parsed
                        .get("reference_number")
                        .and_then(crate::payments::types::json_text),
                }),
                _ => {
                    warn!("hitpay completed payment is missing id or amount");
                    None
                }
            }
        } else {
            None
        };

        Ok(WebhookEvent {
            provider: ProviderName::HitPay,
            event_type: format!("payment.{}", raw_status),
            status,
            settlement,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
