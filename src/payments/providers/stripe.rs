use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    Amount, PaymentMetadata, PaymentState, ProviderName, Settlement, WebhookEvent,
    WebhookVerificationResult,
};
use crate::payments::utils::{
    hmac_sha256_hex, secure_eq, PaymentHttpClient, ProviderAuth, RequestBody,
};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

const PROVIDER: &str = "stripe";
const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub webhook_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.stripe.com/v1".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            webhook_tolerance_secs: 300,
        }
    }
}

impl StripeConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            PaymentError::validation(
                "STRIPE_SECRET_KEY environment variable is required",
                "STRIPE_SECRET_KEY",
            )
        })?;

        Ok(Self {
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            base_url: std::env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            timeout_secs: std::env::var("STRIPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("STRIPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            webhook_tolerance_secs: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(300),
            secret_key,
        })
    }
}

/// QR details of a confirmed PromptPay PaymentIntent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayQr {
    pub id: String,
    pub qr_data_svg: Option<String>,
    pub qr_data_png: Option<String>,
    pub data: Option<String>,
    pub hosted_instructions_url: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    #[serde(default)]
    next_action: Option<StripeNextAction>,
}

#[derive(Debug, Deserialize)]
struct StripeNextAction {
    #[serde(default)]
    promptpay_display_qr_code: Option<StripePromptPayDisplay>,
}

#[derive(Debug, Default, Deserialize)]
struct StripePromptPayDisplay {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    image_url_png: Option<String>,
    #[serde(default)]
    image_url_svg: Option<String>,
    #[serde(default)]
    hosted_instructions_url: Option<String>,
}

pub struct StripeProvider {
    config: StripeConfig,
    http: PaymentHttpClient,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    fn endpoint(&self, segments: &[&str]) -> PaymentResult<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            PaymentError::validation(format!("invalid STRIPE_BASE_URL: {}", e), "STRIPE_BASE_URL")
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                PaymentError::validation("STRIPE_BASE_URL cannot be a base", "STRIPE_BASE_URL")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: Url,
        form: &[(String, String)],
    ) -> PaymentResult<T> {
        let operation = format!("POST {}", url.path());
        log_external_call(PROVIDER, &operation, async {
            self.http
                .request_json(
                    Method::POST,
                    url.as_str(),
                    ProviderAuth::Bearer(&self.config.secret_key),
                    RequestBody::Form(form),
                    &[],
                )
                .await
                .map_err(|e| e.for_provider(PROVIDER))
        })
        .await
    }

    /// Creates a THB PromptPay PaymentIntent and confirms it so Stripe renders the QR code.
    pub async fn create_promptpay_intent(
        &self,
        amount: &Amount,
        metadata: &PaymentMetadata,
        email: Option<&str>,
    ) -> PaymentResult<PromptPayQr> {
        let mut create = vec![
            ("amount".to_string(), amount.to_minor_units()?.to_string()),
            ("currency".to_string(), "thb".to_string()),
            ("payment_method_types[]".to_string(), "promptpay".to_string()),
        ];
        if let Some(user) = &metadata.payni_user_id {
            create.push(("metadata[payniUserId]".to_string(), user.clone()));
        }
        if let Some(currency) = &metadata.currency_id {
            create.push(("metadata[currencyId]".to_string(), currency.clone()));
        }

        let intent: StripePaymentIntent = self
            .post_form(self.endpoint(&["payment_intents"])?, &create)
            .await?;

        let mut confirm = vec![(
            "payment_method_data[type]".to_string(),
            "promptpay".to_string(),
        )];
        if let Some(email) = email {
            confirm.push((
                "payment_method_data[billing_details][email]".to_string(),
                email.to_string(),
            ));
        }

        let confirmed: StripePaymentIntent = self
            .post_form(
                self.endpoint(&["payment_intents", &intent.id, "confirm"])?,
                &confirm,
            )
            .await?;
        info!(payment_intent = %confirmed.id, "stripe promptpay intent confirmed");

        let display = confirmed
            .next_action
            .and_then(|a| a.promptpay_display_qr_code)
            .unwrap_or_default();

        Ok(PromptPayQr {
            id: confirmed.id,
            qr_data_svg: display.image_url_svg,
            qr_data_png: display.image_url_png,
            data: display.data,
            hosted_instructions_url: display.hosted_instructions_url,
            amount: confirmed.amount,
        })
    }
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>,...`) against the raw body.
pub fn verify_signature_header(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), String> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = match timestamp {
        Some(t) if !signatures.is_empty() => t,
        _ => return Err("Unable to extract timestamp and signatures from header".to_string()),
    };

    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(payload);
    let expected = hmac_sha256_hex(&signed, secret)
        .ok_or_else(|| "Unable to compute expected signature".to_string())?;

    if !signatures
        .iter()
        .any(|sig| secure_eq(expected.as_bytes(), sig.as_bytes()))
    {
        return Err("No signatures found matching the expected signature for payload".to_string());
    }

    if (now - timestamp).abs() > tolerance_secs {
        return Err("Timestamp outside the tolerance zone".to_string());
    }

    Ok(())
}

/// Builds a `Stripe-Signature` header for a payload, as Stripe would send it.
pub fn compute_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(payload);
    let signature = hmac_sha256_hex(&signed, secret).unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}

fn event_state(event_type: &str) -> PaymentState {
    match event_type {
        "payment_intent.succeeded" => PaymentState::Success,
        "payment_intent.payment_failed" | "payment_intent.canceled" => PaymentState::Failed,
        "payment_intent.created" | "payment_intent.processing" | "payment_intent.requires_action" => {
            PaymentState::Pending
        }
        _ => PaymentState::Unknown,
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Stripe
    }

    fn signature_header(&self) -> Option<&'static str> {
        Some(SIGNATURE_HEADER)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookVerificationResult> {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            return Ok(WebhookVerificationResult::invalid(
                "STRIPE_WEBHOOK_SECRET is not configured",
            ));
        };
        let Some(header) = signature else {
            return Ok(WebhookVerificationResult::invalid(
                "No stripe-signature header value was provided",
            ));
        };

        let now = chrono::Utc::now().timestamp();
        Ok(
            match verify_signature_header(
                payload,
                header,
                secret,
                self.config.webhook_tolerance_secs,
                now,
            ) {
                Ok(()) => WebhookVerificationResult::valid(),
                Err(reason) => WebhookVerificationResult::invalid(reason),
            },
        )
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let event_type = parsed
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let status = event_state(&event_type);
        let object = parsed.get("data").and_then(|d| d.get("object"));

        let settlement = if event_type == "payment_intent.succeeded" {
            let id = object.and_then(|o| o.get("id")).and_then(|v| v.as_str());
            let amount = object.and_then(|o| o.get("amount")).and_then(|v| v.as_i64());
            match (id, amount) {
                (Some(id), Some(amount)) => {
                    let metadata = object.and_then(|o| o.get("metadata"));
                    let meta = PaymentMetadata::from_json(
                        metadata.and_then(|m| m.get("payniUserId")),
                        metadata.and_then(|m| m.get("currencyId")),
                    );
                    Some(Settlement {
                        transaction_id: id.to_string(),
                        amount: Amount::from_minor_units(amount).into_decimal(),
                        payni_user_id: meta.payni_user_id,
                        currency_id: meta.currency_id,
                    })
                }
                _ => {
                    warn!("stripe payment_intent.succeeded is missing id or amount");
                    None
                }
            }
        } else {
            None
        };

        Ok(WebhookEvent {
            provider: ProviderName::Stripe,
            event_type,
            status,
            settlement,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
