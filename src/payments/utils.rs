use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// How a provider authenticates API calls.
#[derive(Debug, Clone, Copy)]
pub enum ProviderAuth<'a> {
    /// HTTP basic auth with the secret key as username and an empty password.
    Basic(&'a str),
    Bearer(&'a str),
    /// Credentials travel in provider-specific headers.
    Headers,
}

#[derive(Debug, Clone, Copy)]
pub enum RequestBody<'a> {
    Empty,
    Json(&'a JsonValue),
    Form(&'a [(String, String)]),
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
            backoff_base: Duration::from_millis(500),
        })
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * (1_u32 << attempt.min(10))
    }

    /// Sends a request and decodes a JSON response.
    ///
    /// Only idempotent methods are retried, on 429, server and network errors.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        auth: ProviderAuth<'_>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        self.send_json(method, url, auth, body, additional_headers, None)
            .await
    }

    /// Like [`request_json`](Self::request_json), but uses `fallback_message` when an
    /// error response carries no message of its own.
    pub async fn request_json_or<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        auth: ProviderAuth<'_>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
        fallback_message: &str,
    ) -> PaymentResult<T> {
        self.send_json(
            method,
            url,
            auth,
            body,
            additional_headers,
            Some(fallback_message),
        )
        .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        auth: ProviderAuth<'_>,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
        fallback_message: Option<&str>,
    ) -> PaymentResult<T> {
        let idempotent = method == Method::GET || method == Method::DELETE || method == Method::HEAD;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let can_retry = attempt < self.max_retries;
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            request = match auth {
                ProviderAuth::Basic(username) => request.basic_auth(username, Some("")),
                ProviderAuth::Bearer(token) => request.bearer_auth(token),
                ProviderAuth::Headers => request,
            };
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            request = match body {
                RequestBody::Empty => request,
                RequestBody::Json(payload) => request.json(payload),
                RequestBody::Form(pairs) => request.form(pairs),
            };

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    let text = resp.text().await.unwrap_or_default();

                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::ProviderError {
                                provider: "http".to_string(),
                                message: format!("invalid provider JSON response: {}", e),
                                provider_code: None,
                                status: Some(status.as_u16()),
                                retryable: false,
                            }
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if idempotent && can_retry {
                            tokio::time::sleep(self.backoff(attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_seconds: retry_after,
                        });
                    }

                    if status.is_server_error() && idempotent && can_retry {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "provider server error, retrying"
                        );
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }

                    let (message, provider_code) = extract_error_details(&text);
                    return Err(PaymentError::ProviderError {
                        provider: "http".to_string(),
                        message: message
                            .or_else(|| fallback_message.map(|m| m.to_string()))
                            .unwrap_or_else(|| format!("HTTP {}: {}", status, text)),
                        provider_code,
                        status: Some(status.as_u16()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if idempotent && can_retry {
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "provider request failed".to_string(),
        }))
    }
}

/// Pulls a human-readable message and error code out of a provider error body.
///
/// Understands `{"message", "code"}` (Omise, HitPay), `{"error": {"message", "code"}}`
/// (Stripe) and `{"error": "..."}`.
pub fn extract_error_details(body: &str) -> (Option<String>, Option<String>) {
    let parsed: JsonValue = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let text = |v: Option<&JsonValue>| v.and_then(|v| v.as_str()).map(|s| s.to_string());

    let nested = parsed.get("error").filter(|v| v.is_object());
    let message = text(parsed.get("message"))
        .or_else(|| text(nested.and_then(|e| e.get("message"))))
        .or_else(|| text(parsed.get("error")));
    let code = text(parsed.get("code")).or_else(|| text(nested.and_then(|e| e.get("code"))));

    (message, code)
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    match hmac_sha256_hex(payload, secret) {
        Some(computed) => secure_eq(computed.as_bytes(), signature.trim().as_bytes()),
        None => false,
    }
}

pub fn hmac_sha256_hex(payload: &[u8], secret: &str) -> Option<String> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
