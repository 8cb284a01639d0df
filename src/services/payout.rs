//! Chained Omise payout flow with compensating cleanup.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::logging::mask_account_number;
use crate::payments::error::PaymentResult;
use crate::payments::providers::omise::{object_id, OmiseProvider};
use crate::payments::types::{Amount, BankAccount};

#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub name: String,
    pub bank_account: BankAccount,
    pub amount: Amount,
}

/// Processor operations the payout flow needs. Each returns the id of the
/// object it created or touched.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn create_recipient(&self, name: &str, bank_account: &BankAccount)
        -> PaymentResult<String>;
    async fn verify_recipient(&self, recipient_id: &str) -> PaymentResult<()>;
    async fn create_transfer(&self, amount: &Amount, recipient_id: &str) -> PaymentResult<String>;
    async fn mark_transfer_sent(&self, transfer_id: &str) -> PaymentResult<()>;
    async fn mark_transfer_paid(&self, transfer_id: &str) -> PaymentResult<()>;
    async fn destroy_recipient(&self, recipient_id: &str) -> PaymentResult<()>;
    async fn destroy_transfer(&self, transfer_id: &str) -> PaymentResult<()>;
}

#[async_trait]
impl PayoutGateway for OmiseProvider {
    async fn create_recipient(
        &self,
        name: &str,
        bank_account: &BankAccount,
    ) -> PaymentResult<String> {
        let recipient = OmiseProvider::create_recipient(self, name, bank_account).await?;
        object_id(&recipient)
    }

    async fn verify_recipient(&self, recipient_id: &str) -> PaymentResult<()> {
        OmiseProvider::verify_recipient(self, recipient_id).await.map(|_| ())
    }

    async fn create_transfer(&self, amount: &Amount, recipient_id: &str) -> PaymentResult<String> {
        let transfer = OmiseProvider::create_transfer(self, amount, recipient_id).await?;
        object_id(&transfer)
    }

    async fn mark_transfer_sent(&self, transfer_id: &str) -> PaymentResult<()> {
        OmiseProvider::mark_transfer_sent(self, transfer_id).await.map(|_| ())
    }

    async fn mark_transfer_paid(&self, transfer_id: &str) -> PaymentResult<()> {
        OmiseProvider::mark_transfer_paid(self, transfer_id).await.map(|_| ())
    }

    async fn destroy_recipient(&self, recipient_id: &str) -> PaymentResult<()> {
        OmiseProvider::destroy_recipient(self, recipient_id).await.map(|_| ())
    }

    async fn destroy_transfer(&self, transfer_id: &str) -> PaymentResult<()> {
        OmiseProvider::destroy_transfer(self, transfer_id).await.map(|_| ())
    }
}

pub struct PayoutService {
    gateway: Arc<dyn PayoutGateway>,
}

impl PayoutService {
    pub fn new(gateway: Arc<dyn PayoutGateway>) -> Self {
        Self { gateway }
    }

    /// Recipient -> verify -> transfer -> sent -> paid -> delete recipient.
    ///
    /// On failure the recipient and the transfer created so far are deleted
    /// best-effort and the original error is returned.
    pub async fn execute(&self, request: &PayoutRequest) -> PaymentResult<()> {
        info!(
            account = %mask_account_number(&request.bank_account.number),
            brand = %request.bank_account.brand,
            amount = %request.amount,
            "Starting payout"
        );

        let mut recipient_id: Option<String> = None;
        let mut transfer_id: Option<String> = None;

        let result = self
            .run_steps(request, &mut recipient_id, &mut transfer_id)
            .await;

        if let Err(e) = &result {
            error!(error = %e, "Payout failed, cleaning up");
            if let Some(id) = recipient_id.as_deref() {
                if let Err(cleanup) = self.gateway.destroy_recipient(id).await {
                    error!(recipient_id = %id, error = %cleanup, "Error cleaning up recipient");
                }
            }
            if let Some(id) = transfer_id.as_deref() {
                if let Err(cleanup) = self.gateway.destroy_transfer(id).await {
                    error!(transfer_id = %id, error = %cleanup, "Error cleaning up payout");
                }
            }
        }

        result
    }

    async fn run_steps(
        &self,
        request: &PayoutRequest,
        recipient_id: &mut Option<String>,
        transfer_id: &mut Option<String>,
    ) -> PaymentResult<()> {
        let recipient = self
            .gateway
            .create_recipient(&request.name, &request.bank_account)
            .await?;
        *recipient_id = Some(recipient.clone());

        self.gateway.verify_recipient(&recipient).await?;

        let transfer = self
            .gateway
            .create_transfer(&request.amount, &recipient)
            .await?;
        *transfer_id = Some(transfer.clone());

        self.gateway.mark_transfer_sent(&transfer).await?;
        self.gateway.mark_transfer_paid(&transfer).await?;
        self.gateway.destroy_recipient(&recipient).await?;

        info!(recipient_id = %recipient, transfer_id = %transfer, "Payout completed");
        Ok(())
    }
}
