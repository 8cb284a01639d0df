//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::database::repository::TransactionStore;
use crate::payments::factory::PaymentProviderFactory;
use crate::payments::types::ProviderName;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    store: Option<Arc<dyn TransactionStore>>,
    providers: Arc<PaymentProviderFactory>,
}

impl HealthChecker {
    pub fn new(
        store: Option<Arc<dyn TransactionStore>>,
        providers: Arc<PaymentProviderFactory>,
    ) -> Self {
        Self { store, providers }
    }

    /// Database down is unhealthy; a missing database or processor is degraded.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut unhealthy = false;
        let mut degraded = false;

        match &self.store {
            Some(store) => {
                let start = Instant::now();
                match timeout(Duration::from_secs(5), store.ping()).await {
                    Ok(Ok(())) => {
                        let response_time = start.elapsed().as_millis();
                        health_status.checks.insert(
                            "database".to_string(),
                            ComponentHealth::up(Some(response_time)),
                        );
                        info!("Database health check: OK ({}ms)", response_time);
                    }
                    Ok(Err(e)) => {
                        unhealthy = true;
                        health_status.checks.insert(
                            "database".to_string(),
                            ComponentHealth::down(Some(e.to_string())),
                        );
                        error!("Database health check failed: {}", e);
                    }
                    Err(_) => {
                        unhealthy = true;
                        health_status.checks.insert(
                            "database".to_string(),
                            ComponentHealth::down(Some("Timeout".to_string())),
                        );
                        error!("Database health check timed out");
                    }
                }
            }
            None => {
                degraded = true;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::warning(None, Some("DATABASE_URL not configured".to_string())),
                );
            }
        }

        let available = self.providers.list_available_providers();
        for provider in [ProviderName::Omise, ProviderName::Stripe, ProviderName::HitPay] {
            let health = if available.contains(&provider) {
                ComponentHealth::up(None)
            } else {
                degraded = true;
                warn!(provider = %provider, "Payment provider not configured");
                ComponentHealth::warning(None, Some("not configured".to_string()))
            };
            health_status.checks.insert(provider.to_string(), health);
        }

        health_status.status = if unhealthy {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }
}
