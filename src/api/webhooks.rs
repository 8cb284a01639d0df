use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, warn};

use super::AppState;
use crate::error::AppError;
use crate::payments::types::ProviderName;
use crate::services::webhook_processor::{WebhookOutcome, WebhookProcessorError};

/// Reads the signature from the header the provider signs with.
fn signature_from<'a>(
    state: &AppState,
    provider: ProviderName,
    headers: &'a HeaderMap,
) -> Option<&'a str> {
    let name = state.providers.get_provider(provider).ok()?.signature_header()?;
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn log_outcome(provider: ProviderName, outcome: &WebhookOutcome) {
    match outcome {
        WebhookOutcome::Recorded { transaction_id } => {
            info!(provider = %provider, transaction_id = %transaction_id, "Webhook recorded payment")
        }
        WebhookOutcome::Duplicate { transaction_id } => {
            info!(provider = %provider, transaction_id = %transaction_id, "Webhook redelivered")
        }
        WebhookOutcome::Ignored { event_type } => {
            info!(provider = %provider, event_type = %event_type, "Unhandled webhook event")
        }
        WebhookOutcome::NotConfirmed { transaction_id } => {
            warn!(provider = %provider, transaction_id = %transaction_id, "Charge is not successful")
        }
        WebhookOutcome::StoreFailed {
            transaction_id,
            reason,
        } => error!(
            provider = %provider,
            transaction_id = %transaction_id,
            reason = %reason,
            "Webhook payment not stored"
        ),
    }
}

fn unavailable(provider: ProviderName, message: String) -> Response {
    error!(provider = %provider, error = %message, "Webhook received for unconfigured provider");
    AppError::configuration(message).into_response()
}

/// POST /omise-webhook. Always acknowledged so Omise stops redelivering.
pub async fn omise_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    match state
        .webhooks
        .process_webhook(ProviderName::Omise, None, &body)
        .await
    {
        Ok(outcome) => log_outcome(ProviderName::Omise, &outcome),
        Err(e) => warn!(provider = "omise", error = %e, "Webhook dropped"),
    }
    (StatusCode::OK, "OK").into_response()
}

/// POST /stripe-webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = signature_from(&state, ProviderName::Stripe, &headers);
    match state
        .webhooks
        .process_webhook(ProviderName::Stripe, signature, &body)
        .await
    {
        Ok(outcome) => {
            log_outcome(ProviderName::Stripe, &outcome);
            Json(serde_json::json!({ "received": true })).into_response()
        }
        Err(WebhookProcessorError::InvalidSignature(reason))
        | Err(WebhookProcessorError::InvalidPayload(reason)) => {
            warn!(provider = "stripe", reason = %reason, "Stripe webhook rejected");
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", reason)).into_response()
        }
        Err(WebhookProcessorError::ProviderUnavailable(message)) => {
            unavailable(ProviderName::Stripe, message)
        }
    }
}

/// POST /hitpay-webhook
pub async fn hitpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = signature_from(&state, ProviderName::HitPay, &headers);
    match state
        .webhooks
        .process_webhook(ProviderName::HitPay, signature, &body)
        .await
    {
        Ok(outcome) => {
            log_outcome(ProviderName::HitPay, &outcome);
            if matches!(outcome, WebhookOutcome::StoreFailed { .. }) {
                (StatusCode::OK, "OK, but internal error occurred.").into_response()
            } else {
                (StatusCode::OK, "OK").into_response()
            }
        }
        Err(WebhookProcessorError::InvalidSignature(reason)) => {
            warn!(provider = "hitpay", reason = %reason, "HMAC validation failed");
            (
                StatusCode::BAD_REQUEST,
                "HMAC validation failed or signature/body missing.",
            )
                .into_response()
        }
        Err(WebhookProcessorError::InvalidPayload(reason)) => {
            warn!(provider = "hitpay", reason = %reason, "HitPay webhook payload rejected");
            (StatusCode::BAD_REQUEST, "Invalid webhook payload.").into_response()
        }
        Err(WebhookProcessorError::ProviderUnavailable(message)) => {
            unavailable(ProviderName::HitPay, message)
        }
    }
}
