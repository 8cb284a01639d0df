//! Tracing setup and helpers for keeping sensitive values out of logs

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
pub fn init_tracing_with(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("payni_gateway={0},tower_http={0}", config.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    // Tests and embedders may have installed a subscriber already
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// `jane.doe@example.com` -> `ja***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{}***@{}", visible, domain)
        }
        None => "***".to_string(),
    }
}

/// Keeps the last four digits.
pub fn mask_account_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Keeps the prefix of processor tokens such as `tokn_` or `sk_test_`.
pub fn mask_token(token: &str) -> String {
    match token.rfind('_') {
        Some(idx) if idx + 1 < token.len() => format!("{}***", &token[..=idx]),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("jane.doe@example.com"), "ja***@example.com");
        assert_eq!(mask_email("j@x.io"), "j***@x.io");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_mask_account_number() {
        assert_eq!(mask_account_number("1234567890"), "****7890");
        assert_eq!(mask_account_number("123"), "****");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("tokn_test_5xyz"), "tokn_test_***");
        assert_eq!(mask_token("sk_live_abc"), "sk_live_***");
        assert_eq!(mask_token("opaque"), "***");
    }
}
