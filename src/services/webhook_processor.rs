use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::repository::{NewTransaction, TransactionStore};
use crate::payments::factory::PaymentProviderFactory;
use crate::payments::types::ProviderName;

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("{0}")]
    InvalidSignature(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Provider not configured: {0}")]
    ProviderUnavailable(String),
}

/// What happened to a webhook that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Recorded { transaction_id: String },
    /// The transaction was already stored by an earlier delivery.
    Duplicate { transaction_id: String },
    /// Not a successful payment; nothing to store.
    Ignored { event_type: String },
    /// The processor does not confirm the payment as successful.
    NotConfirmed { transaction_id: String },
    StoreFailed { transaction_id: String, reason: String },
}

pub struct WebhookProcessor {
    provider_factory: Arc<PaymentProviderFactory>,
    store: Option<Arc<dyn TransactionStore>>,
}

impl WebhookProcessor {
    pub fn new(
        provider_factory: Arc<PaymentProviderFactory>,
        store: Option<Arc<dyn TransactionStore>>,
    ) -> Self {
        Self {
            provider_factory,
            store,
        }
    }

    pub async fn process_webhook(
        &self,
        provider_name: ProviderName,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookOutcome, WebhookProcessorError> {
        let provider = self
            .provider_factory
            .get_provider(provider_name)
            .map_err(|e| WebhookProcessorError::ProviderUnavailable(e.to_string()))?;

        let verification = provider
            .verify_webhook(raw_body, signature)
            .map_err(|e| WebhookProcessorError::InvalidSignature(e.to_string()))?;
        if !verification.valid {
            let reason = verification
                .reason
                .unwrap_or_else(|| "signature verification failed".to_string());
            error!(provider = %provider_name, reason = %reason, "Invalid webhook signature");
            return Err(WebhookProcessorError::InvalidSignature(reason));
        }

        let event = provider
            .parse_webhook_event(raw_body)
            .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))?;

        let Some(settlement) = event.settlement.clone() else {
            info!(
                provider = %provider_name,
                event_type = %event.event_type,
                "Webhook carries no settled payment"
            );
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        if !provider.confirm_settlement(&event).await {
            warn!(
                provider = %provider_name,
                transaction_id = %settlement.transaction_id,
                "Payment not confirmed by provider"
            );
            return Ok(WebhookOutcome::NotConfirmed {
                transaction_id: settlement.transaction_id,
            });
        }

        let Some(store) = self.store.as_ref() else {
            warn!(
                provider = %provider_name,
                transaction_id = %settlement.transaction_id,
                "No transaction store configured, payment not recorded"
            );
            return Ok(WebhookOutcome::StoreFailed {
                transaction_id: settlement.transaction_id,
                reason: "transaction store not configured".to_string(),
            });
        };

        let record = NewTransaction {
            transaction_id: settlement.transaction_id.clone(),
            amount: settlement.amount,
            payni_user_id: settlement.payni_user_id,
            currency_id: settlement.currency_id,
            is_found: false,
        };

        match store.record_transaction(&record).await {
            Ok(true) => {
                info!(
                    provider = %provider_name,
                    transaction_id = %record.transaction_id,
                    amount = %record.amount,
                    "Payment recorded"
                );
                Ok(WebhookOutcome::Recorded {
                    transaction_id: record.transaction_id,
                })
            }
            Ok(false) => {
                info!(
                    provider = %provider_name,
                    transaction_id = %record.transaction_id,
                    "Payment already recorded"
                );
                Ok(WebhookOutcome::Duplicate {
                    transaction_id: record.transaction_id,
                })
            }
            Err(e) => {
                error!(
                    provider = %provider_name,
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "Failed to record payment"
                );
                Ok(WebhookOutcome::StoreFailed {
                    transaction_id: record.transaction_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}
