//! # Built-in Provider Factory
//!
//! Builds the providers this crate ships for the registry. One HTTP client
//! is shared by every provider instance.

use crate::paypal::{self, PayPalProvider};
use crate::placeholder::PlaceholderProvider;
use crate::stripe::{self, StripeClient, StripeProvider};
use gateway_core::{BoxedGatewayProvider, GatewayError, GatewayResult, ProviderFactory, ProviderKind};
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remote API base URLs (overridable for sandboxes and mock servers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub stripe_api_base: String,
    pub paypal_api_base: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            stripe_api_base: stripe::DEFAULT_API_BASE.to_string(),
            paypal_api_base: paypal::DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Read `STRIPE_API_BASE` and `PAYPAL_API_BASE`, falling back to production
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stripe_api_base: env::var("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            paypal_api_base: env::var("PAYPAL_API_BASE").unwrap_or(defaults.paypal_api_base),
        }
    }

    /// Builder: point both providers at one base URL (mock servers)
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            stripe_api_base: base.clone(),
            paypal_api_base: base,
        }
    }
}

pub struct BuiltinProviderFactory {
    http: Client,
    endpoints: ProviderEndpoints,
}

impl BuiltinProviderFactory {
    pub fn new(endpoints: ProviderEndpoints) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, endpoints })
    }
}

impl ProviderFactory for BuiltinProviderFactory {
    fn create(&self, kind: &ProviderKind) -> Option<BoxedGatewayProvider> {
        debug!(provider = %kind, "Instantiating built-in provider");
        let provider: BoxedGatewayProvider = match kind {
            ProviderKind::Stripe => Arc::new(StripeProvider::new(StripeClient::new(
                self.http.clone(),
                self.endpoints.stripe_api_base.clone(),
            ))),
            ProviderKind::PayPal => Arc::new(PayPalProvider::new(
                self.http.clone(),
                self.endpoints.paypal_api_base.clone(),
            )),
            ProviderKind::Square | ProviderKind::EPayMints | ProviderKind::KingdomFunding => {
                Arc::new(PlaceholderProvider::new(kind.clone()))
            }
            ProviderKind::Other(_) => return None,
        };
        Some(provider)
    }
}
