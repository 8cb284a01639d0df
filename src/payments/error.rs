use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    #[error("Provider not configured: {provider}")]
    NotConfigured { provider: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        /// HTTP status returned by the provider, when the call got a response.
        status: Option<u16>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: &str) -> Self {
        PaymentError::ValidationError {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::RateLimitError { .. } => true,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::NotConfigured { .. } => false,
            PaymentError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::RateLimitError { .. } => 429,
            PaymentError::WebhookVerificationError { .. } => 400,
            PaymentError::NotConfigured { .. } => 500,
            PaymentError::ProviderError { status, .. } => match status {
                Some(code) if (400..500).contains(code) => *code,
                _ => 502,
            },
        }
    }

    /// Attaches the provider name to errors raised by the shared HTTP client.
    pub fn for_provider(self, name: &str) -> Self {
        match self {
            PaymentError::ProviderError {
                message,
                provider_code,
                status,
                retryable,
                ..
            } => PaymentError::ProviderError {
                provider: name.to_string(),
                message,
                provider_code,
                status,
                retryable,
            },
            other => other,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, ExternalError, InfrastructureError, ValidationError,
        };

        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::Unavailable {
                    service: "payments".to_string(),
                    message,
                })
            }
            PaymentError::RateLimitError {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "payments".to_string(),
                retry_after: retry_after_seconds,
            }),
            PaymentError::WebhookVerificationError { message } => {
                AppErrorKind::External(ExternalError::WebhookSignature { reason: message })
            }
            PaymentError::NotConfigured { provider } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration {
                    message: format!("Payment provider '{}' is not configured.", provider),
                })
            }
            PaymentError::ProviderError {
                provider,
                message,
                status,
                retryable,
                ..
            } => AppErrorKind::External(ExternalError::PaymentProvider {
                provider,
                message,
                status,
                is_retryable: retryable,
            }),
        };

        AppError::new(kind)
    }
}
