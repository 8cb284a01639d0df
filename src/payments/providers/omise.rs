use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    Amount, BankAccount, PaymentMetadata, PaymentState, ProviderName, Settlement, WebhookEvent,
    WebhookVerificationResult,
};
use crate::payments::utils::{PaymentHttpClient, ProviderAuth, RequestBody};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

const PROVIDER: &str = "omise";

#[derive(Debug, Clone)]
pub struct OmiseConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for OmiseConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            base_url: "https://api.omise.co".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl OmiseConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key = std::env::var("OMISE_SECRET_KEY").map_err(|_| {
            PaymentError::validation(
                "OMISE_SECRET_KEY environment variable is required",
                "OMISE_SECRET_KEY",
            )
        })?;

        Ok(Self {
            base_url: std::env::var("OMISE_BASE_URL")
                .unwrap_or_else(|_| "https://api.omise.co".to_string()),
            timeout_secs: std::env::var("OMISE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("OMISE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            secret_key,
        })
    }
}

/// QR payment sources Omise can render for a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrSource {
    PromptPay,
    PayNowQr,
}

impl QrSource {
    pub fn source_type(&self) -> &'static str {
        match self {
            QrSource::PromptPay => "promptpay",
            QrSource::PayNowQr => "paynow_qr",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            QrSource::PromptPay => "thb",
            QrSource::PayNowQr => "sgd",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmiseCharge {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OmiseList {
    #[serde(default)]
    data: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct OmiseCustomer {
    cards: OmiseList,
}

pub struct OmiseProvider {
    config: OmiseConfig,
    http: PaymentHttpClient,
}

impl OmiseProvider {
    pub fn new(config: OmiseConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(OmiseConfig::from_env()?)
    }

    fn endpoint(&self, segments: &[&str]) -> PaymentResult<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            PaymentError::validation(format!("invalid OMISE_BASE_URL: {}", e), "OMISE_BASE_URL")
        })?;
        url.path_segments_mut()
            .map_err(|_| PaymentError::validation("OMISE_BASE_URL cannot be a base", "OMISE_BASE_URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: RequestBody<'_>,
    ) -> PaymentResult<T> {
        let operation = format!("{} {}", method, url.path());
        log_external_call(PROVIDER, &operation, async {
            self.http
                .request_json(
                    method.clone(),
                    url.as_str(),
                    ProviderAuth::Basic(&self.config.secret_key),
                    body,
                    &[],
                )
                .await
                .map_err(|e| e.for_provider(PROVIDER))
        })
        .await
    }

    /// Creates a QR charge (PromptPay in THB, PayNow in SGD) and returns the raw charge.
    pub async fn create_source_charge(
        &self,
        amount: &Amount,
        source: QrSource,
        metadata: &PaymentMetadata,
    ) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({
            "amount": amount.to_minor_units()?,
            "currency": source.currency(),
            "metadata": metadata,
            "source": { "type": source.source_type() },
        });
        let charge: JsonValue = self
            .call(
                Method::POST,
                self.endpoint(&["charges"])?,
                RequestBody::Json(&payload),
            )
            .await?;
        info!(
            charge_id = charge.get("id").and_then(|v| v.as_str()).unwrap_or("unknown"),
            source = source.source_type(),
            "omise QR charge created"
        );
        Ok(charge)
    }

    /// Charges a stored card of an existing customer in THB.
    pub async fn create_card_charge(
        &self,
        amount: &Amount,
        customer_id: &str,
        card_id: &str,
        metadata: &PaymentMetadata,
    ) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({
            "amount": amount.to_minor_units()?,
            "currency": "thb",
            "customer": customer_id,
            "card": card_id,
            "metadata": metadata,
        });
        self.call(
            Method::POST,
            self.endpoint(&["charges"])?,
            RequestBody::Json(&payload),
        )
        .await
    }

    pub async fn retrieve_charge(&self, charge_id: &str) -> PaymentResult<OmiseCharge> {
        self.call(
            Method::GET,
            self.endpoint(&["charges", charge_id])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn mark_charge_paid(&self, charge_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::POST,
            self.endpoint(&["charges", charge_id, "mark_as_paid"])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn create_customer(&self, email: &str) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({
            "email": email,
            "description": format!("Customer for {}", email),
        });
        self.call(
            Method::POST,
            self.endpoint(&["customers"])?,
            RequestBody::Json(&payload),
        )
        .await
    }

    /// Looks a customer up by email; emails are unique per customer so the first hit wins.
    pub async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<String>> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut()
            .append_pair("scope", "customer")
            .append_pair("query", email)
            .append_pair("per_page", "1");
        let result: OmiseList = self.call(Method::GET, url, RequestBody::Empty).await?;
        Ok(result
            .data
            .first()
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }

    /// Attaches a tokenized card to a customer and returns the card that was added.
    pub async fn attach_card(&self, customer_id: &str, card_token: &str) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({ "card": card_token });
        let customer: OmiseCustomer = self
            .call(
                Method::PATCH,
                self.endpoint(&["customers", customer_id])?,
                RequestBody::Json(&payload),
            )
            .await?;
        Ok(customer.cards.data.last().cloned().unwrap_or(JsonValue::Null))
    }

    pub async fn list_cards(&self, customer_id: &str) -> PaymentResult<Vec<JsonValue>> {
        let cards: OmiseList = self
            .call(
                Method::GET,
                self.endpoint(&["customers", customer_id, "cards"])?,
                RequestBody::Empty,
            )
            .await?;
        Ok(cards.data)
    }

    pub async fn create_recipient(
        &self,
        name: &str,
        bank_account: &BankAccount,
    ) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({
            "name": name,
            "type": "individual",
            "bank_account": {
                "brand": bank_account.brand,
                "number": bank_account.number,
                "name": bank_account.name,
            },
        });
        self.call(
            Method::POST,
            self.endpoint(&["recipients"])?,
            RequestBody::Json(&payload),
        )
        .await
    }

    pub async fn verify_recipient(&self, recipient_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::PATCH,
            self.endpoint(&["recipients", recipient_id, "verify"])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn destroy_recipient(&self, recipient_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::DELETE,
            self.endpoint(&["recipients", recipient_id])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn create_transfer(
        &self,
        amount: &Amount,
        recipient_id: &str,
    ) -> PaymentResult<JsonValue> {
        let payload = serde_json::json!({
            "amount": amount.to_minor_units()?,
            "currency": "thb",
            "recipient": recipient_id,
        });
        self.call(
            Method::POST,
            self.endpoint(&["transfers"])?,
            RequestBody::Json(&payload),
        )
        .await
    }

    pub async fn mark_transfer_sent(&self, transfer_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::POST,
            self.endpoint(&["transfers", transfer_id, "mark_as_sent"])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn mark_transfer_paid(&self, transfer_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::POST,
            self.endpoint(&["transfers", transfer_id, "mark_as_paid"])?,
            RequestBody::Empty,
        )
        .await
    }

    pub async fn destroy_transfer(&self, transfer_id: &str) -> PaymentResult<JsonValue> {
        self.call(
            Method::DELETE,
            self.endpoint(&["transfers", transfer_id])?,
            RequestBody::Empty,
        )
        .await
    }
}

/// Reads the `id` of an object returned by Omise.
pub fn object_id(object: &JsonValue) -> PaymentResult<String> {
    object
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| PaymentError::ProviderError {
            provider: PROVIDER.to_string(),
            message: "response is missing an object id".to_string(),
            provider_code: None,
            status: None,
            retryable: false,
        })
}

fn charge_state(status: &str) -> PaymentState {
    match status {
        "successful" => PaymentState::Success,
        "pending" => PaymentState::Pending,
        "failed" | "expired" | "reversed" => PaymentState::Failed,
        _ => PaymentState::Unknown,
    }
}

#[async_trait]
impl PaymentProvider for OmiseProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Omise
    }

    fn signature_header(&self) -> Option<&'static str> {
        None
    }

    fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: Option<&str>,
    ) -> PaymentResult<WebhookVerificationResult> {
        // Unsigned; settlements are re-checked through confirm_settlement.
        Ok(WebhookVerificationResult::valid())
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let is_event = parsed.get("object").and_then(|v| v.as_str()) == Some("event");
        let event_type = parsed
            .get("key")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let data = parsed.get("data");
        let status = data
            .and_then(|d| d.get("status"))
            .and_then(|v| v.as_str())
            .map(charge_state)
            .unwrap_or(PaymentState::Unknown);

        let settlement = if is_event && status == PaymentState::Success {
            let id = data.and_then(|d| d.get("id")).and_then(|v| v.as_str());
            let amount = data.and_then(|d| d.get("amount")).and_then(|v| v.as_i64());
            match (id, amount) {
                (Some(id), Some(amount)) => {
                    let metadata = data.and_then(|d| d.get("metadata"));
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
                    warn!("omise successful charge event is missing id or amount");
                    None
                }
            }
        } else {
            None
        };

        Ok(WebhookEvent {
            provider: ProviderName::Omise,
            event_type,
            status,
            settlement,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn confirm_settlement(&self, event: &WebhookEvent) -> bool {
        let Some(settlement) = event.settlement.as_ref() else {
            return false;
        };
        match self.retrieve_charge(&settlement.transaction_id).await {
            Ok(charge) => charge.status == "successful",
            Err(e) => {
                warn!(
                    charge_id = %settlement.transaction_id,
                    error = %e,
                    "failed to retrieve omise charge"
                );
                false
            }
        }
    }
}
