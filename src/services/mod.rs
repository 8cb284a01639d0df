//! Services module for business logic

pub mod payout;
pub mod webhook_processor;

pub use payout::{PayoutGateway, PayoutRequest, PayoutService};
pub use webhook_processor::{WebhookOutcome, WebhookProcessor, WebhookProcessorError};
