use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use super::{amount_field, parse_body, text_field, AppState, ResultExt};
use crate::error::AppResult;
use crate::payments::providers::{HitPayQr, QrMethod};

async fn qr_payment(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    method: QrMethod,
) -> AppResult<Json<HitPayQr>> {
    let body = parse_body(body).for_request(headers)?;
    let amount = amount_field(&body, "Valid amount is required.").for_request(headers)?;
    let hitpay = state.providers.hitpay().for_request(headers)?;

    let payni_user_id = text_field(&body, "payniUserId");
    let currency_id = text_field(&body, "currencyId");
    let qr = hitpay
        .create_qr_payment(
            &amount,
            method,
            payni_user_id.as_deref(),
            currency_id.as_deref(),
        )
        .await
        .for_request(headers)?;
    Ok(Json(qr))
}

/// POST /create-promptpay-charge-hitpay
pub async fn create_promptpay_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<HitPayQr>> {
    qr_payment(&state, &headers, &body, QrMethod::PromptPay).await
}

/// POST /create-paynow-charge-hitpay
pub async fn create_paynow_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<HitPayQr>> {
    qr_payment(&state, &headers, &body, QrMethod::PayNow).await
}
