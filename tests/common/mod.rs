#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use payni_gateway::api::{build_router, AppState};
use payni_gateway::config::ServerConfig;
use payni_gateway::database::error::{DatabaseError, DatabaseErrorKind};
use payni_gateway::database::repository::{NewTransaction, TransactionStore};
use payni_gateway::payments::providers::{
    HitPayConfig, HitPayProvider, OmiseConfig, OmiseProvider, StripeConfig, StripeProvider,
};
use payni_gateway::payments::PaymentProviderFactory;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const HITPAY_SALT: &str = "hitpay_salt";

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<NewTransaction>>,
    pub fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<NewTransaction> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn record_transaction(&self, transaction: &NewTransaction) -> Result<bool, DatabaseError> {
        if self.fail {
            return Err(DatabaseError::new(DatabaseErrorKind::Connection {
                message: "connection refused".to_string(),
            }));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.transaction_id == transaction.transaction_id)
        {
            return Ok(false);
        }
        rows.push(transaction.clone());
        Ok(true)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// All three processors pointed at one mock server.
pub fn providers(base_url: &str) -> PaymentProviderFactory {
    PaymentProviderFactory::new()
        .with_omise(
            OmiseProvider::new(OmiseConfig {
                secret_key: "skey_test".to_string(),
                base_url: base_url.to_string(),
                timeout_secs: 5,
                max_retries: 0,
            })
            .unwrap(),
        )
        .with_stripe(
            StripeProvider::new(StripeConfig {
                secret_key: "sk_test".to_string(),
                webhook_secret: Some(STRIPE_WEBHOOK_SECRET.to_string()),
                base_url: base_url.to_string(),
                timeout_secs: 5,
                max_retries: 0,
                webhook_tolerance_secs: 300,
            })
            .unwrap(),
        )
        .with_hitpay(
            HitPayProvider::new(HitPayConfig {
                api_key: "hp_key".to_string(),
                api_url: format!("{}/v1/payment-requests", base_url),
                webhook_salt: Some(HITPAY_SALT.to_string()),
                timeout_secs: 5,
                max_retries: 0,
            })
            .unwrap(),
        )
}

pub fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 4000,
        cors_allowed_origins: vec!["*".to_string()],
    }
}

pub fn app(base_url: &str, store: Arc<MemoryStore>) -> Router {
    let store: Arc<dyn TransactionStore> = store;
    build_router(AppState::new(providers(base_url), Some(store)), &server_config())
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}
