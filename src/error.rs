//! Unified error handling for the gateway
//!
//! Every failure that reaches an HTTP handler is an [`AppError`]. It carries an
//! HTTP status, a machine-readable code and the message shown to the client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "CUSTOMER_NOT_FOUND")]
    CustomerNotFound,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "SERVICE_UNAVAILABLE")]
    ServiceUnavailable,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "WEBHOOK_SIGNATURE_INVALID")]
    WebhookSignatureInvalid,

    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

#[derive(Debug, Clone)]
pub enum DomainError {
    /// No processor-side customer matches the email
    CustomerNotFound { email: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// Errors raised by the payment processors or while talking to them
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// The processor answered with an error
    PaymentProvider {
        provider: String,
        message: String,
        status: Option<u16>,
        is_retryable: bool,
    },
    /// The processor could not be reached
    Unavailable { service: String, message: String },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    WebhookSignature { reason: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// A field is missing or has an unusable value; `reason` is shown to the client
    InvalidField { field: String, reason: String },
    /// The request body could not be decoded
    MalformedBody { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Prefix shown before the user message, e.g. `Failed to search customer`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(DomainError::CustomerNotFound { .. }) => 404,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                // 4xx from the processor is usually the caller's fault, pass it on
                ExternalError::PaymentProvider {
                    status: Some(code), ..
                } if (400..500).contains(code) => *code,
                ExternalError::PaymentProvider { .. } => 502,
                ExternalError::Unavailable { .. } => 503,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::WebhookSignature { .. } => 400,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::CustomerNotFound { .. }) => {
                ErrorCode::CustomerNotFound
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::Unavailable { .. } => ErrorCode::ServiceUnavailable,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::WebhookSignature { .. } => ErrorCode::WebhookSignatureInvalid,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Message returned in the `error` field of the response body
    pub fn user_message(&self) -> String {
        let message = match &self.kind {
            AppErrorKind::Domain(DomainError::CustomerNotFound { email }) => format!(
                "Customer with email '{}' not found. Ensure the email is correct and the customer exists.",
                email
            ),
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => {
                    "Service temporarily unavailable. Please try again later".to_string()
                }
                InfrastructureError::Configuration { message } => message.clone(),
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { message, .. } => message.clone(),
                ExternalError::Unavailable { message, .. } => message.clone(),
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => match retry_after {
                    Some(secs) => format!(
                        "Rate limit exceeded for {}. Please try again in {} seconds",
                        service, secs
                    ),
                    None => format!(
                        "Rate limit exceeded for {}. Please try again later",
                        service
                    ),
                },
                ExternalError::WebhookSignature { reason } => reason.clone(),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidField { reason, .. } => reason.clone(),
                ValidationError::MalformedBody { reason } => {
                    format!("Invalid request body: {}", reason)
                }
            },
        };

        match &self.context {
            Some(context) => format!("{}: {}", context, message),
            None => message,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::Unavailable { .. } => true,
                ExternalError::RateLimit { .. } => true,
                ExternalError::WebhookSignature { .. } => false,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// From<DatabaseError> lives in database/error.rs, From<PaymentError> in payments/error.rs

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_not_found_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::CustomerNotFound {
            email: "a@b.co".to_string(),
        }));

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::CustomerNotFound);
        assert!(error.user_message().contains("'a@b.co' not found"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_provider_client_errors_pass_through() {
        let rejected = AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: "hitpay".to_string(),
            message: "amount is invalid".to_string(),
            status: Some(422),
            is_retryable: false,
        }));
        assert_eq!(rejected.status_code(), 422);
        assert_eq!(rejected.user_message(), "amount is invalid");

        let broken = AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: "omise".to_string(),
            message: "internal".to_string(),
            status: Some(500),
            is_retryable: true,
        }));
        assert_eq!(broken.status_code(), 502);
        assert!(broken.is_retryable());
    }

    #[test]
    fn test_rate_limit_error() {
        let error = AppError::new(AppErrorKind::External(ExternalError::RateLimit {
            service: "stripe".to_string(),
            retry_after: Some(60),
        }));

        assert_eq!(error.status_code(), 429);
        assert_eq!(error.error_code(), ErrorCode::RateLimitError);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_error_keeps_reason() {
        let error = AppError::validation("amount", "Valid amount is required.");

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert_eq!(error.user_message(), "Valid amount is required.");
    }

    #[test]
    fn test_context_prefixes_message() {
        let error = AppError::new(AppErrorKind::External(ExternalError::Unavailable {
            service: "omise".to_string(),
            message: "connection refused".to_string(),
        }))
        .with_context("Failed to search customer");

        assert_eq!(
            error.user_message(),
            "Failed to search customer: connection refused"
        );
        assert_eq!(error.status_code(), 503);
    }
}
