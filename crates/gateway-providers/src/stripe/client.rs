//! # Stripe REST Client
//!
//! Thin form-encoded client over the Stripe API. Authentication comes from
//! the per-call [`GatewayConfig`], so one client serves every tenant.

use gateway_core::{GatewayConfig, GatewayError, GatewayResult};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const API_VERSION: &str = "2024-12-18.acacia";

/// Form body as ordered `(key, value)` pairs
pub type Form = Vec<(String, String)>;

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base_url: String,
    api_version: String,
}

impl StripeClient {
    pub fn new(http: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            api_version: API_VERSION.to_string(),
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub async fn get(&self, config: &GatewayConfig, path: &str, query: &Form) -> GatewayResult<Value> {
        self.send(config, Method::GET, path, Some(query), None, None).await
    }

    pub async fn post(
        &self,
        config: &GatewayConfig,
        path: &str,
        form: &Form,
        idempotency_key: Option<&str>,
    ) -> GatewayResult<Value> {
        self.send(config, Method::POST, path, None, Some(form), idempotency_key)
            .await
    }

    pub async fn delete(&self, config: &GatewayConfig, path: &str, form: &Form) -> GatewayResult<Value> {
        self.send(config, Method::DELETE, path, None, Some(form), None)
            .await
    }

    async fn send(
        &self,
        config: &GatewayConfig,
        method: Method,
        path: &str,
        query: Option<&Form>,
        form: Option<&Form>,
        idempotency_key: Option<&str>,
    ) -> GatewayResult<Value> {
        if config.private_key.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "Stripe secret key is not configured for gateway {}",
                config.gateway_id
            )));
        }

        let url = format!("{}{}", self.api_base_url, path);
        debug!(method = %method, path = %path, "Stripe request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", config.private_key))
            .header("Stripe-Version", &self.api_version);

        if let Some(account) = connect_account(config) {
            request = request.header("Stripe-Account", account);
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            request = request.query(query);
        }
        if let Some(form) = form.filter(|f| !f.is_empty()) {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, path = %path, "Stripe API error");

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(GatewayError::provider("stripe", error_response.error.message));
            }

            return Err(GatewayError::provider(
                "stripe",
                format!("HTTP {}: {}", status, body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            GatewayError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

/// Connected account the gateway's settings route calls through, if any
fn connect_account(config: &GatewayConfig) -> Option<&str> {
    config
        .settings
        .as_ref()
        .and_then(|settings| settings.as_stripe())
        .and_then(|stripe| stripe.connect_account_id.as_deref())
        .filter(|account| !account.is_empty())
}

/// Pull a string field out of a Stripe object
pub fn str_field<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// Required `id` of a Stripe response object
pub fn object_id(object: &Value) -> GatewayResult<String> {
    str_field(object, "id")
        .map(String::from)
        .ok_or_else(|| GatewayError::Serialization("Stripe response has no id".to_string()))
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_is_normalised() {
        let client = StripeClient::new(Client::new(), "http://localhost:1234/");
        assert_eq!(client.api_base_url(), "http://localhost:1234");
    }

    #[test]
    fn test_object_id() {
        assert_eq!(object_id(&json!({ "id": "pi_1" })).unwrap(), "pi_1");
        assert!(object_id(&json!({ "object": "list" })).is_err());
    }
}
