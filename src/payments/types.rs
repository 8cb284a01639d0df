use crate::payments::error::{PaymentError, PaymentResult};
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Omise,
    Stripe,
    #[serde(rename = "hitpay")]
    HitPay,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Omise => "omise",
            ProviderName::Stripe => "stripe",
            ProviderName::HitPay => "hitpay",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "omise" | "opn" => Ok(ProviderName::Omise),
            "stripe" => Ok(ProviderName::Stripe),
            "hitpay" | "hit-pay" => Ok(ProviderName::HitPay),
            _ => Err(PaymentError::validation(
                format!("unsupported provider: {}", value),
                "provider",
            )),
        }
    }
}

const MAX_AMOUNT_TEXT_LEN: usize = 32;
const MAX_AMOUNT_SCALE: u64 = 18;

/// A client-supplied amount. Accepts JSON numbers and numeric strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(BigDecimal);

impl Amount {
    /// Parses and checks that the amount is present and greater than zero.
    pub fn from_json(value: Option<&JsonValue>, field: &str) -> PaymentResult<Self> {
        let text = match value {
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return Err(PaymentError::validation("Valid amount is required.", field)),
        };
        if text.len() > MAX_AMOUNT_TEXT_LEN {
            return Err(PaymentError::validation("Valid amount is required.", field));
        }
        let parsed = BigDecimal::from_str(&text).map_err(|_| {
            PaymentError::validation(format!("invalid decimal amount: {}", text), field)
        })?;
        // Bounded before any comparison or rescaling touches it.
        let (_, scale) = parsed.as_bigint_and_exponent();
        if scale.unsigned_abs() > MAX_AMOUNT_SCALE {
            return Err(PaymentError::validation("Valid amount is required.", field));
        }
        let amount = Self(parsed);
        amount.validate_positive(field)?;
        Ok(amount)
    }

    pub fn validate_positive(&self, field: &str) -> PaymentResult<()> {
        if self.0 <= BigDecimal::from(0) {
            return Err(PaymentError::validation(
                "amount must be greater than zero",
                field,
            ));
        }
        Ok(())
    }

    /// Amount in the smallest currency unit, as Omise and Stripe expect it.
    pub fn to_minor_units(&self) -> PaymentResult<i64> {
        if !self.0.is_integer() {
            return Err(PaymentError::validation(
                "amount must be an integer in the smallest currency unit",
                "amount",
            ));
        }
        self.0
            .to_i64()
            .ok_or_else(|| PaymentError::validation("amount is out of range", "amount"))
    }

    /// Converts a two-decimal minor-unit amount (satang, cents) to major units.
    pub fn from_minor_units(minor: i64) -> Self {
        Self(BigDecimal::from(minor) / BigDecimal::from(100))
    }

    pub fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }

    pub fn into_decimal(self) -> BigDecimal {
        self.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
    Unknown,
}

/// Identifiers the client attaches to a charge so the webhook can credit the right user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentMetadata {
    #[serde(rename = "payniUserId", default, skip_serializing_if = "Option::is_none")]
    pub payni_user_id: Option<String>,
    #[serde(rename = "currencyId", default, skip_serializing_if = "Option::is_none")]
    pub currency_id: Option<String>,
}

impl PaymentMetadata {
    pub fn from_json(payni_user_id: Option<&JsonValue>, currency_id: Option<&JsonValue>) -> Self {
        Self {
            payni_user_id: payni_user_id.and_then(json_text),
            currency_id: currency_id.and_then(json_text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankAccount {
    pub brand: String,
    pub number: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl WebhookVerificationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A completed payment extracted from a webhook, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub payni_user_id: Option<String>,
    pub currency_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub provider: ProviderName,
    pub event_type: String,
    pub status: PaymentState,
    pub settlement: Option<Settlement>,
    pub payload: JsonValue,
    pub received_at: String,
}

/// Renders a metadata value as text: strings as-is, numbers and booleans via Display.
pub fn json_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        let from_number = Amount::from_json(Some(&json!(10000)), "amount").unwrap();
        assert_eq!(from_number.to_minor_units().unwrap(), 10000);

        let from_string = Amount::from_json(Some(&json!("123.50")), "amount").unwrap();
        assert_eq!(
            from_string.as_decimal(),
            &BigDecimal::from_str("123.5").unwrap()
        );
    }

    #[test]
    fn amount_rejects_missing_zero_and_negative() {
        assert!(Amount::from_json(None, "amount").is_err());
        assert!(Amount::from_json(Some(&json!(0)), "amount").is_err());
        assert!(Amount::from_json(Some(&json!(-5)), "amount").is_err());
        assert!(Amount::from_json(Some(&json!("abc")), "amount").is_err());
        assert!(Amount::from_json(Some(&json!(null)), "amount").is_err());
    }

    #[test]
    fn amount_rejects_extreme_exponents_quickly() {
        let started = std::time::Instant::now();
        for text in ["1e-20000000", "1e20000000", "1e19", "1e-19"] {
            let err = Amount::from_json(Some(&json!(text)), "amount").unwrap_err();
            assert!(matches!(err, PaymentError::ValidationError { .. }));
        }
        let long = "1".repeat(64);
        assert!(Amount::from_json(Some(&json!(long)), "amount").is_err());
        assert!(started.elapsed() < std::time::Duration::from_millis(500));

        let large = Amount::from_json(Some(&json!("1e6")), "amount").unwrap();
        assert_eq!(large.to_minor_units().unwrap(), 1_000_000);
    }

    #[test]
    fn minor_units_require_integer_amounts() {
        let fractional = Amount::from_json(Some(&json!(10.5)), "amount").unwrap();
        assert!(fractional.to_minor_units().is_err());
    }

    #[test]
    fn minor_units_convert_to_major_units() {
        let amount = Amount::from_minor_units(12345);
        assert_eq!(amount.as_decimal(), &BigDecimal::from_str("123.45").unwrap());
    }

    #[test]
    fn metadata_serializes_with_client_field_names() {
        let metadata = PaymentMetadata::from_json(Some(&json!("user-1")), Some(&json!(7)));
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, json!({"payniUserId": "user-1", "currencyId": "7"}));

        let empty = serde_json::to_value(PaymentMetadata::default()).unwrap();
        assert_eq!(empty, json!({}));
    }

    #[test]
    fn provider_name_round_trips_through_str() {
        for name in [ProviderName::Omise, ProviderName::Stripe, ProviderName::HitPay] {
            assert_eq!(ProviderName::from_str(name.as_str()).unwrap(), name);
        }
        assert!(ProviderName::from_str("paystack").is_err());
    }
}
