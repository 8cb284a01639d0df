mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{app, get_json, post_json, send, MemoryStore};
use mockito::Matcher;
use payni_gateway::api::{build_router, AppState};
use payni_gateway::payments::PaymentProviderFactory;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn omise_promptpay_charge_is_forwarded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/charges")
        .match_body(Matcher::PartialJson(json!({
            "amount": 10025,
            "currency": "thb",
            "source": {"type": "promptpay"},
            "metadata": {"payniUserId": "user-1", "currencyId": "7"}
        })))
        .with_status(200)
        .with_body(r#"{"object":"charge","id":"chrg_test_1","status":"pending","amount":10025}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-promptpay-charge-omise",
        json!({"amount": 10025, "payniUserId": "user-1", "currencyId": 7}),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "chrg_test_1");
}

#[tokio::test]
async fn missing_or_non_positive_amount_is_rejected() {
    let server = mockito::Server::new_async().await;
    for payload in [json!({}), json!({"amount": 0}), json!({"amount": -5})] {
        let (status, body) = post_json(
            app(&server.url(), Arc::new(MemoryStore::default())),
            "/create-paynow-charge-omise",
            payload,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Valid amount is required.");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn exponent_amounts_are_rejected_without_arithmetic() {
    let server = mockito::Server::new_async().await;
    for amount in ["1e-20000000", "1e20000000"] {
        let started = std::time::Instant::now();
        let (status, body) = post_json(
            app(&server.url(), Arc::new(MemoryStore::default())),
            "/create-promptpay-charge-omise",
            json!({ "amount": amount }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Valid amount is required.");
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}

#[tokio::test]
async fn customer_is_created_with_description() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/customers")
        .match_body(Matcher::Json(json!({
            "email": "jane@example.com",
            "description": "Customer for jane@example.com"
        })))
        .with_status(200)
        .with_body(r#"{"object":"customer","id":"cust_new","email":"jane@example.com"}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-omise-customer",
        json!({"email": "jane@example.com"}),
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "cust_new");
}

#[tokio::test]
async fn customer_creation_requires_email() {
    let server = mockito::Server::new_async().await;
    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-omise-customer",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required.");
}

#[tokio::test]
async fn customer_cards_are_listed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/customers/cust_1/cards")
        .with_status(200)
        .with_body(r#"{"object":"list","data":[{"id":"card_a"},{"id":"card_b"}]}"#)
        .create_async()
        .await;

    let (status, body) = get_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/list-customer-cards/cust_1",
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "card_a"}, {"id": "card_b"}]));
}

#[tokio::test]
async fn recipient_is_created_as_individual() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/recipients")
        .match_body(Matcher::Json(json!({
            "name": "Somchai",
            "type": "individual",
            "bank_account": {"brand": "kbank", "number": "0987654321", "name": "Somchai J"}
        })))
        .with_status(200)
        .with_body(r#"{"object":"recipient","id":"recp_9"}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-recipient",
        json!({
            "name": "Somchai",
            "bankAccount": {"brand": "kbank", "number": "0987654321", "name": "Somchai J"}
        }),
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "recp_9");
}

#[tokio::test]
async fn recipient_requires_name_and_bank_account() {
    let server = mockito::Server::new_async().await;
    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-recipient",
        json!({"name": "Somchai", "bankAccount": {"brand": "kbank"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and bank account details are required.");
}

#[tokio::test]
async fn card_charge_requires_customer_and_card() {
    let server = mockito::Server::new_async().await;
    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-card-charge",
        json!({"amount": 5000, "omiseCustomerId": "cust_1"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Valid amount, omiseCustomerId, and cardId are required."
    );
}

#[tokio::test]
async fn customer_lookup_by_email() {
    let mut server = mockito::Server::new_async().await;
    let _found = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("scope".into(), "customer".into()),
            Matcher::UrlEncoded("query".into(), "jane@example.com".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"object":"search","data":[{"id":"cust_test_9"}]}"#)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("query".into(), "nobody@example.com".into()))
        .with_status(200)
        .with_body(r#"{"object":"search","data":[]}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::default());
    let (status, body) = get_json(
        app(&server.url(), store.clone()),
        "/get-omise-customer-id/jane@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Customer ID retrieved successfully.",
            "email": "jane@example.com",
            "customerId": "cust_test_9"
        })
    );

    let (status, body) = get_json(
        app(&server.url(), store),
        "/get-omise-customer-id/nobody@example.com",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CUSTOMER_NOT_FOUND");
}

#[tokio::test]
async fn added_card_is_the_last_one() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("PATCH", "/customers/cust_1")
        .match_body(Matcher::Json(json!({"card": "tokn_abc"})))
        .with_status(200)
        .with_body(r#"{"id":"cust_1","cards":{"data":[{"id":"card_old"},{"id":"card_new"}]}}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/add-card-to-customer",
        json!({"omiseCustomerId": "cust_1", "cardToken": "tokn_abc"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "card_new");
}

#[tokio::test]
async fn charge_paid_answers_success_string() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/charges/chrg_1/mark_as_paid")
        .with_status(200)
        .with_body(r#"{"id":"chrg_1","paid":true}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/charge-paid",
        json!({"chargeId": "chrg_1"}),
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Success"));
}

#[tokio::test]
async fn stripe_promptpay_returns_qr_subset() {
    let mut server = mockito::Server::new_async().await;
    let _create = server
        .mock("POST", "/payment_intents")
        .match_header("authorization", "Bearer sk_test")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("amount".into(), "5000".into()),
            Matcher::UrlEncoded("currency".into(), "thb".into()),
            Matcher::UrlEncoded("metadata[payniUserId]".into(), "u-9".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"pi_1","amount":5000}"#)
        .create_async()
        .await;
    let _confirm = server
        .mock("POST", "/payment_intents/pi_1/confirm")
        .with_status(200)
        .with_body(
            r#"{"id":"pi_1","amount":5000,"next_action":{"promptpay_display_qr_code":{
                "data":"000201","image_url_png":"https://q/png","image_url_svg":"https://q/svg",
                "hosted_instructions_url":"https://q/h"}}}"#,
        )
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-promptpay-charge-stripe",
        json!({"amount": 5000, "payniUserId": "u-9", "email": "a@b.co"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "id": "pi_1",
            "qrDataSvg": "https://q/svg",
            "qrDataPng": "https://q/png",
            "data": "000201",
            "hostedInstructionsUrl": "https://q/h",
            "amount": 5000
        })
    );
}

#[tokio::test]
async fn hitpay_errors_keep_upstream_status_and_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/payment-requests")
        .with_status(422)
        .with_body(r#"{"message":"The amount must be at least 0.3."}"#)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-paynow-charge-hitpay",
        json!({"amount": 0.1}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "The amount must be at least 0.3.");
}

#[tokio::test]
async fn unconfigured_processor_is_a_configuration_error() {
    let router = build_router(
        AppState::new(PaymentProviderFactory::new(), None),
        &common::server_config(),
    );
    let (status, body) = post_json(
        router,
        "/create-promptpay-charge-hitpay",
        json!({"amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn payout_runs_the_full_chain() {
    let mut server = mockito::Server::new_async().await;
    let recipient = server
        .mock("POST", "/recipients")
        .match_body(Matcher::PartialJson(json!({
            "name": "Somchai",
            "type": "individual",
            "bank_account": {"brand": "bbl", "number": "1234567890", "name": "Somchai J"}
        })))
        .with_status(200)
        .with_body(r#"{"id":"recp_1"}"#)
        .create_async()
        .await;
    let verify = server
        .mock("PATCH", "/recipients/recp_1/verify")
        .with_status(200)
        .with_body(r#"{"id":"recp_1","verified":true}"#)
        .create_async()
        .await;
    let transfer = server
        .mock("POST", "/transfers")
        .match_body(Matcher::PartialJson(json!({"amount": 100000, "recipient": "recp_1"})))
        .with_status(200)
        .with_body(r#"{"id":"trsf_1"}"#)
        .create_async()
        .await;
    let sent = server
        .mock("POST", "/transfers/trsf_1/mark_as_sent")
        .with_status(200)
        .with_body(r#"{"id":"trsf_1","sent":true}"#)
        .create_async()
        .await;
    let paid = server
        .mock("POST", "/transfers/trsf_1/mark_as_paid")
        .with_status(200)
        .with_body(r#"{"id":"trsf_1","paid":true}"#)
        .create_async()
        .await;
    let destroy = server
        .mock("DELETE", "/recipients/recp_1")
        .with_status(200)
        .with_body(r#"{"id":"recp_1","deleted":true}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-payout",
        json!({
            "name": "Somchai",
            "amount": 100000,
            "bankAccount": {"brand": "bbl", "number": "1234567890", "name": "Somchai J"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Success"}));
    for mock in [recipient, verify, transfer, sent, paid, destroy] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn failed_payout_cleans_up_recipient_and_transfer() {
    let mut server = mockito::Server::new_async().await;
    let _recipient = server
        .mock("POST", "/recipients")
        .with_status(200)
        .with_body(r#"{"id":"recp_2"}"#)
        .create_async()
        .await;
    let _verify = server
        .mock("PATCH", "/recipients/recp_2/verify")
        .with_status(200)
        .with_body(r#"{"id":"recp_2"}"#)
        .create_async()
        .await;
    let _transfer = server
        .mock("POST", "/transfers")
        .with_status(200)
        .with_body(r#"{"id":"trsf_2"}"#)
        .create_async()
        .await;
    let _sent = server
        .mock("POST", "/transfers/trsf_2/mark_as_sent")
        .with_status(400)
        .with_body(r#"{"object":"error","code":"failed_sending","message":"transfer cannot be sent"}"#)
        .create_async()
        .await;
    let delete_recipient = server
        .mock("DELETE", "/recipients/recp_2")
        .with_status(200)
        .with_body(r#"{"deleted":true}"#)
        .expect(1)
        .create_async()
        .await;
    let delete_transfer = server
        .mock("DELETE", "/transfers/trsf_2")
        .with_status(200)
        .with_body(r#"{"deleted":true}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-payout",
        json!({
            "name": "Somchai",
            "amount": 100000,
            "bankAccount": {"brand": "bbl", "number": "1234567890", "name": "Somchai J"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "transfer cannot be sent");
    delete_recipient.assert_async().await;
    delete_transfer.assert_async().await;
}

#[tokio::test]
async fn payout_validation_message() {
    let server = mockito::Server::new_async().await;
    let (status, body) = post_json(
        app(&server.url(), Arc::new(MemoryStore::default())),
        "/create-payout",
        json!({"name": "Somchai", "amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields are required and amount must be valid.");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let server = mockito::Server::new_async().await;
    let request = Request::builder()
        .method("GET")
        .uri("/create-payout")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&server.url(), Arc::new(MemoryStore::default())), request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn liveness_and_health() {
    let server = mockito::Server::new_async().await;
    let store = Arc::new(MemoryStore::default());

    let request = Request::builder().uri("/health/live").body(Body::empty()).unwrap();
    let (status, body) = send(app(&server.url(), store.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = get_json(app(&server.url(), store), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Healthy");
    assert_eq!(body["checks"]["database"]["status"], "Up");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let server = mockito::Server::new_async().await;
    let request = Request::builder().uri("/health/live").body(Body::empty()).unwrap();
    let response = tower::ServiceExt::oneshot(
        app(&server.url(), Arc::new(MemoryStore::default())),
        request,
    )
    .await
    .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
