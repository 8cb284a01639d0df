use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::providers::{HitPayProvider, OmiseProvider, StripeProvider};
use crate::payments::types::ProviderName;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PaymentFactoryConfig {
    pub enabled_providers: Vec<ProviderName>,
}

impl Default for PaymentFactoryConfig {
    fn default() -> Self {
        Self {
            enabled_providers: vec![ProviderName::Omise, ProviderName::Stripe, ProviderName::HitPay],
        }
    }
}

impl PaymentFactoryConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_PAYMENT_PROVIDERS")
            .unwrap_or_else(|_| "omise,stripe,hitpay".to_string());
        let mut enabled_providers = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            let provider = ProviderName::from_str(value)?;
            if !enabled_providers.contains(&provider) {
                enabled_providers.push(provider);
            }
        }

        Ok(Self { enabled_providers })
    }
}

/// Holds one client per configured processor.
///
/// A processor that is disabled, or whose credentials are missing, stays
/// absent; requests for it fail with [`PaymentError::NotConfigured`].
#[derive(Clone, Default)]
pub struct PaymentProviderFactory {
    omise: Option<Arc<OmiseProvider>>,
    stripe: Option<Arc<StripeProvider>>,
    hitpay: Option<Arc<HitPayProvider>>,
}

impl PaymentProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> PaymentResult<Self> {
        let config = PaymentFactoryConfig::from_env()?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &PaymentFactoryConfig) -> Self {
        let mut factory = Self::new();
        for provider in &config.enabled_providers {
            let loaded = match provider {
                ProviderName::Omise => {
                    OmiseProvider::from_env().map(|p| factory.omise = Some(Arc::new(p)))
                }
                ProviderName::Stripe => {
                    StripeProvider::from_env().map(|p| factory.stripe = Some(Arc::new(p)))
                }
                ProviderName::HitPay => {
                    HitPayProvider::from_env().map(|p| factory.hitpay = Some(Arc::new(p)))
                }
            };
            match loaded {
                Ok(()) => info!(provider = %provider, "payment provider enabled"),
                Err(e) => warn!(provider = %provider, error = %e, "payment provider left disabled"),
            }
        }
        factory
    }

    pub fn with_omise(mut self, provider: OmiseProvider) -> Self {
        self.omise = Some(Arc::new(provider));
        self
    }

    pub fn with_stripe(mut self, provider: StripeProvider) -> Self {
        self.stripe = Some(Arc::new(provider));
        self
    }

    pub fn with_hitpay(mut self, provider: HitPayProvider) -> Self {
        self.hitpay = Some(Arc::new(provider));
        self
    }

    pub fn omise(&self) -> PaymentResult<Arc<OmiseProvider>> {
        self.omise.clone().ok_or_else(|| not_configured(ProviderName::Omise))
    }

    pub fn stripe(&self) -> PaymentResult<Arc<StripeProvider>> {
        self.stripe.clone().ok_or_else(|| not_configured(ProviderName::Stripe))
    }

    pub fn hitpay(&self) -> PaymentResult<Arc<HitPayProvider>> {
        self.hitpay.clone().ok_or_else(|| not_configured(ProviderName::HitPay))
    }

    pub fn get_provider(&self, provider: ProviderName) -> PaymentResult<Arc<dyn PaymentProvider>> {
        let provider: Arc<dyn PaymentProvider> = match provider {
            ProviderName::Omise => self.omise()?,
            ProviderName::Stripe => self.stripe()?,
            ProviderName::HitPay => self.hitpay()?,
        };
        Ok(provider)
    }

    pub fn list_available_providers(&self) -> Vec<ProviderName> {
        let mut providers = Vec::new();
        if self.omise.is_some() {
            providers.push(ProviderName::Omise);
        }
        if self.stripe.is_some() {
            providers.push(ProviderName::Stripe);
        }
        if self.hitpay.is_some() {
            providers.push(ProviderName::HitPay);
        }
        providers
    }
}

fn not_configured(provider: ProviderName) -> PaymentError {
    PaymentError::NotConfigured {
        provider: provider.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::providers::{HitPayConfig, OmiseConfig};

    #[test]
    fn provider_name_parsing_works() {
        assert!(matches!(ProviderName::from_str("omise"), Ok(ProviderName::Omise)));
        assert!(matches!(ProviderName::from_str("hitpay"), Ok(ProviderName::HitPay)));
        assert!(ProviderName::from_str("paystack").is_err());
    }

    #[test]
    fn missing_providers_report_not_configured() {
        let factory = PaymentProviderFactory::new();
        assert!(factory.list_available_providers().is_empty());
        assert!(matches!(
            factory.get_provider(ProviderName::Stripe),
            Err(PaymentError::NotConfigured { ref provider }) if provider == "stripe"
        ));
    }

    #[test]
    fn list_available_providers_returns_configured() {
        let factory = PaymentProviderFactory::new()
            .with_omise(
                OmiseProvider::new(OmiseConfig {
                    secret_key: "skey_test".to_string(),
                    ..OmiseConfig::default()
                })
                .unwrap(),
            )
            .with_hitpay(
                HitPayProvider::new(HitPayConfig {
                    api_key: "hp".to_string(),
                    ..HitPayConfig::default()
                })
                .unwrap(),
            );

        assert_eq!(
            factory.list_available_providers(),
            vec![ProviderName::Omise, ProviderName::HitPay]
        );
        assert_eq!(
            factory.get_provider(ProviderName::HitPay).unwrap().name(),
            ProviderName::HitPay
        );
    }
}
