use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Expected shape of a structured response
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    /// Tool name the model must answer through
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the response object
    pub schema: serde_json::Value,
}

/// One structured request to the model
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub system: String,
    pub prompt: String,
    pub response_schema: ResponseSchema,
    pub temperature: f64,
}

/// Capability to send a prompt and receive a structured result
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send the request and return the raw structured result
    async fn invoke(&self, request: &GatewayRequest) -> Result<serde_json::Value, GatewayError>;
}

/// Retry policy for gateway calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(1),
        }
    }
}

/// Invoke the gateway, decode into `T` and validate it
///
/// Decode and validation failures are schema violations. Transient and
/// schema failures are retried with the same request; auth failures are
/// returned immediately.
pub async fn invoke_structured<T, V>(
    gateway: &dyn LlmGateway,
    request: &GatewayRequest,
    policy: &RetryPolicy,
    validate: V,
) -> Result<T, GatewayError>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), String>,
{
    invoke_converted(gateway, request, policy, |decoded: T| {
        validate(&decoded).map(|()| decoded)
    })
    .await
}

/// Like [`invoke_structured`], but `convert` turns the decoded response into
/// its checked form, failing with a schema violation message
pub async fn invoke_converted<T, U, C>(
    gateway: &dyn LlmGateway,
    request: &GatewayRequest,
    policy: &RetryPolicy,
    convert: C,
) -> Result<U, GatewayError>
where
    T: DeserializeOwned,
    C: Fn(T) -> Result<U, String>,
{
    let mut attempt = 0;

    loop {
        debug!(
            "Invoking {} (attempt {}, temperature {})",
            request.response_schema.name,
            attempt + 1,
            request.temperature
        );

        let error = match gateway.invoke(request).await {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(decoded) => match convert(decoded) {
                    Ok(converted) => return Ok(converted),
                    Err(message) => GatewayError::schema_violation(message),
                },
                Err(e) => GatewayError::schema_violation(format!(
                    "response does not match {}: {}",
                    request.response_schema.name, e
                )),
            },
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= policy.max_retries {
            return Err(error);
        }

        attempt += 1;
        warn!(
            "{} failed ({}), retry {} of {}",
            request.response_schema.name, error, attempt, policy.max_retries
        );
        if !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }
}
