//! HTTP surface: router, shared state and request helpers

pub mod hitpay;
pub mod omise;
pub mod stripe;
pub mod webhooks;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::ServerConfig;
use crate::database::repository::TransactionStore;
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::health::{HealthChecker, HealthState, HealthStatus};
use crate::middleware::error::get_request_id_from_headers;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::payments::error::PaymentError;
use crate::payments::factory::PaymentProviderFactory;
use crate::payments::types::{json_text, Amount};
use crate::services::payout::{PayoutGateway, PayoutService};
use crate::services::webhook_processor::WebhookProcessor;

#[derive(Clone)]
pub struct AppState {
    pub providers: Arc<PaymentProviderFactory>,
    pub webhooks: Arc<WebhookProcessor>,
    pub payouts: Option<Arc<PayoutService>>,
    pub health_checker: HealthChecker,
}

impl AppState {
    pub fn new(
        providers: PaymentProviderFactory,
        store: Option<Arc<dyn TransactionStore>>,
    ) -> Self {
        let providers = Arc::new(providers);
        let payouts = providers.omise().ok().map(|omise| {
            let gateway: Arc<dyn PayoutGateway> = omise;
            Arc::new(PayoutService::new(gateway))
        });

        Self {
            webhooks: Arc::new(WebhookProcessor::new(providers.clone(), store.clone())),
            health_checker: HealthChecker::new(store, providers.clone()),
            payouts,
            providers,
        }
    }
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/omise-webhook", post(webhooks::omise_webhook))
        .route("/stripe-webhook", post(webhooks::stripe_webhook))
        .route("/hitpay-webhook", post(webhooks::hitpay_webhook))
        .route(
            "/create-promptpay-charge-omise",
            post(omise::create_promptpay_charge),
        )
        .route("/create-paynow-charge-omise", post(omise::create_paynow_charge))
        .route("/create-omise-customer", post(omise::create_customer))
        .route(
            "/get-omise-customer-id/{email}",
            get(omise::get_customer_id),
        )
        .route("/add-card-to-customer", post(omise::add_card_to_customer))
        .route(
            "/list-customer-cards/{omise_cus_id}",
            get(omise::list_customer_cards),
        )
        .route("/create-card-charge", post(omise::create_card_charge))
        .route("/charge-paid", post(omise::charge_paid))
        .route("/create-recipient", post(omise::create_recipient))
        .route("/create-payout", post(omise::create_payout))
        .route(
            "/create-promptpay-charge-stripe",
            post(stripe::create_promptpay_charge),
        )
        .route(
            "/create-promptpay-charge-hitpay",
            post(hitpay::create_promptpay_charge),
        )
        .route(
            "/create-paynow-charge-hitpay",
            post(hitpay::create_paynow_charge),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(server)),
        )
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = state.health_checker.check_health().await;

    if health_status.status == HealthState::Unhealthy {
        error!("Health check failed - service unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    } else {
        Ok(Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    health(state).await
}

/// Liveness probe - the process is up
async fn liveness() -> &'static str {
    "OK"
}

/// Tags errors with the request id taken from the incoming headers.
pub(crate) trait ResultExt<T> {
    fn for_request(self, headers: &HeaderMap) -> AppResult<T>;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn for_request(self, headers: &HeaderMap) -> AppResult<T> {
        self.map_err(|e| {
            let err: AppError = e.into();
            match get_request_id_from_headers(headers) {
                Some(id) => err.with_request_id(id),
                None => err,
            }
        })
    }
}

/// Decodes a JSON object body. An empty body is treated as `{}`.
pub(crate) fn parse_body(body: &Bytes) -> AppResult<JsonValue> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(JsonValue::Object(Default::default()));
    }
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(value @ JsonValue::Object(_)) => Ok(value),
        Ok(_) => Err(malformed("expected a JSON object")),
        Err(e) => Err(malformed(&e.to_string())),
    }
}

fn malformed(reason: &str) -> AppError {
    AppError::new(AppErrorKind::Validation(ValidationError::MalformedBody {
        reason: reason.to_string(),
    }))
}

/// A non-empty text field; numbers are accepted and rendered as text.
pub(crate) fn text_field(body: &JsonValue, name: &str) -> Option<String> {
    body.get(name)
        .and_then(json_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parses a positive `amount`, answering with `message` when it is missing or not positive.
pub(crate) fn amount_field(body: &JsonValue, message: &str) -> AppResult<Amount> {
    Amount::from_json(body.get("amount"), "amount").map_err(|e| match e {
        PaymentError::ValidationError { .. } => AppError::validation("amount", message),
        other => other.into(),
    })
}
