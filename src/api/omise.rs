use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::{amount_field, parse_body, text_field, AppState, ResultExt};
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::logging::{mask_email, mask_token};
use crate::payments::error::PaymentError;
use crate::payments::providers::QrSource;
use crate::payments::types::{BankAccount, PaymentMetadata};
use crate::services::payout::PayoutRequest;

fn metadata(body: &JsonValue) -> PaymentMetadata {
    PaymentMetadata::from_json(body.get("payniUserId"), body.get("currencyId"))
}

fn bank_account(body: &JsonValue) -> Option<BankAccount> {
    let account = body.get("bankAccount")?;
    Some(BankAccount {
        brand: text_field(account, "brand")?,
        number: text_field(account, "number")?,
        name: text_field(account, "name")?,
    })
}

async fn source_charge(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    source: QrSource,
) -> AppResult<Json<JsonValue>> {
    let body = parse_body(body).for_request(headers)?;
    let amount = amount_field(&body, "Valid amount is required.").for_request(headers)?;
    let omise = state.providers.omise().for_request(headers)?;

    let charge = omise
        .create_source_charge(&amount, source, &metadata(&body))
        .await
        .for_request(headers)?;
    Ok(Json(charge))
}

/// POST /create-promptpay-charge-omise
pub async fn create_promptpay_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    source_charge(&state, &headers, &body, QrSource::PromptPay).await
}

/// POST /create-paynow-charge-omise
pub async fn create_paynow_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    source_charge(&state, &headers, &body, QrSource::PayNowQr).await
}

/// POST /create-omise-customer
pub async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    let body = parse_body(&body).for_request(&headers)?;
    let email = text_field(&body, "email")
        .ok_or_else(|| AppError::validation("email", "Email is required."))
        .for_request(&headers)?;
    let omise = state.providers.omise().for_request(&headers)?;

    info!(email = %mask_email(&email), "Creating omise customer");
    let customer = omise.create_customer(&email).await.for_request(&headers)?;
    Ok(Json(customer))
}

/// GET /get-omise-customer-id/{email}
pub async fn get_customer_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> AppResult<Json<JsonValue>> {
    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::validation(
            "email",
            "Customer email is required for search (e.g., /get-omise-customer-id?email=test@example.com).",
        ))
        .for_request(&headers);
    }
    let omise = state.providers.omise().for_request(&headers)?;

    let customer_id = omise
        .find_customer_by_email(&email)
        .await
        .map_err(|e| AppError::from(e).with_context("Failed to search customer"))
        .for_request(&headers)?;

    match customer_id {
        Some(customer_id) => Ok(Json(json!({
            "message": "Customer ID retrieved successfully.",
            "email": email,
            "customerId": customer_id,
        }))),
        None => Err(AppError::new(AppErrorKind::Domain(
            DomainError::CustomerNotFound { email },
        )))
        .for_request(&headers),
    }
}

/// POST /add-card-to-customer
pub async fn add_card_to_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    let body = parse_body(&body).for_request(&headers)?;
    let (Some(customer_id), Some(card_token)) = (
        text_field(&body, "omiseCustomerId"),
        text_field(&body, "cardToken"),
    ) else {
        return Err(AppError::validation(
            "omiseCustomerId",
            "omiseCustomerId and cardToken are required.",
        ))
        .for_request(&headers);
    };
    let omise = state.providers.omise().for_request(&headers)?;

    info!(customer_id = %customer_id, card_token = %mask_token(&card_token), "Attaching card");
    let card = omise
        .attach_card(&customer_id, &card_token)
        .await
        .for_request(&headers)?;
    Ok(Json(card))
}

/// GET /list-customer-cards/{omiseCusId}
pub async fn list_customer_cards(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
) -> AppResult<Json<Vec<JsonValue>>> {
    let customer_id = customer_id.trim();
    if customer_id.is_empty() {
        return Err(AppError::validation(
            "omiseCustomerId",
            "omiseCustomerId is required.",
        ))
        .for_request(&headers);
    }
    let omise = state.providers.omise().for_request(&headers)?;

    let cards = omise.list_cards(customer_id).await.for_request(&headers)?;
    Ok(Json(cards))
}

/// POST /create-card-charge
pub async fn create_card_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    const MESSAGE: &str = "Valid amount, omiseCustomerId, and cardId are required.";

    let body = parse_body(&body).for_request(&headers)?;
    let amount = amount_field(&body, MESSAGE).for_request(&headers)?;
    let (Some(customer_id), Some(card_id)) = (
        text_field(&body, "omiseCustomerId"),
        text_field(&body, "cardId"),
    ) else {
        return Err(AppError::validation("omiseCustomerId", MESSAGE)).for_request(&headers);
    };
    let omise = state.providers.omise().for_request(&headers)?;

    let charge = omise
        .create_card_charge(&amount, &customer_id, &card_id, &metadata(&body))
        .await
        .for_request(&headers)?;
    Ok(Json(charge))
}

/// POST /charge-paid
pub async fn charge_paid(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<&'static str>> {
    let body = parse_body(&body).for_request(&headers)?;
    let charge_id = text_field(&body, "chargeId")
        .ok_or_else(|| AppError::validation("chargeId", "chargeId is required."))
        .for_request(&headers)?;
    let omise = state.providers.omise().for_request(&headers)?;

    omise
        .mark_charge_paid(&charge_id)
        .await
        .for_request(&headers)?;
    Ok(Json("Success"))
}

/// POST /create-recipient
pub async fn create_recipient(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    let body = parse_body(&body).for_request(&headers)?;
    let (Some(name), Some(account)) = (text_field(&body, "name"), bank_account(&body)) else {
        return Err(AppError::validation(
            "bankAccount",
            "Name and bank account details are required.",
        ))
        .for_request(&headers);
    };
    let omise = state.providers.omise().for_request(&headers)?;

    let recipient = omise
        .create_recipient(&name, &account)
        .await
        .for_request(&headers)?;
    Ok(Json(recipient))
}

/// POST /create-payout
pub async fn create_payout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<JsonValue>> {
    const MESSAGE: &str = "All fields are required and amount must be valid.";

    let body = parse_body(&body).for_request(&headers)?;
    let amount = amount_field(&body, MESSAGE).for_request(&headers)?;
    let (Some(name), Some(bank_account)) = (text_field(&body, "name"), bank_account(&body)) else {
        return Err(AppError::validation("bankAccount", MESSAGE)).for_request(&headers);
    };
    let payouts = state
        .payouts
        .clone()
        .ok_or_else(|| PaymentError::NotConfigured {
            provider: "omise".to_string(),
        })
        .for_request(&headers)?;

    payouts
        .execute(&PayoutRequest {
            name,
            bank_account,
            amount,
        })
        .await
        .for_request(&headers)?;
    Ok(Json(json!({ "message": "Success" })))
}
