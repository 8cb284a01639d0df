use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use super::{amount_field, parse_body, text_field, AppState, ResultExt};
use crate::error::AppResult;
use crate::payments::providers::PromptPayQr;
use crate::payments::types::PaymentMetadata;

/// POST /create-promptpay-charge-stripe
pub async fn create_promptpay_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<PromptPayQr>> {
    let body = parse_body(&body).for_request(&headers)?;
    let amount = amount_field(&body, "Valid amount is required.").for_request(&headers)?;
    let stripe = state.providers.stripe().for_request(&headers)?;

    let metadata = PaymentMetadata::from_json(body.get("payniUserId"), body.get("currencyId"));
    let email = text_field(&body, "email");
    let qr = stripe
        .create_promptpay_intent(&amount, &metadata, email.as_deref())
        .await
        .for_request(&headers)?;
    Ok(Json(qr))
}
