use crate::payments::error::PaymentResult;
use crate::payments::types::{ProviderName, WebhookEvent, WebhookVerificationResult};
use async_trait::async_trait;

/// Webhook-facing surface shared by every processor.
///
/// Charge creation differs too much between processors to share a signature,
/// so each provider exposes its own typed operations alongside this trait.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Header carrying the webhook signature, or `None` when the processor does not sign.
    fn signature_header(&self) -> Option<&'static str>;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookVerificationResult>;

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent>;

    /// Second check on a settlement before it is recorded.
    async fn confirm_settlement(&self, _event: &WebhookEvent) -> bool {
        true
    }
}
