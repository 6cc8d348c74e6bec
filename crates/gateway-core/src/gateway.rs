//! # Gateway Records
//!
//! A tenant's stored payment-provider account (`Gateway`) and the
//! per-call runtime view derived from it (`GatewayConfig`).

use crate::settings::ValidatedSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known payment providers, with an escape hatch for custom registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Stripe,
    PayPal,
    Square,
    EPayMints,
    KingdomFunding,
    /// Any other tag, stored lowercased
    Other(String),
}

impl ProviderKind {
    /// Providers that are always registered
    pub const MANDATORY: [ProviderKind; 2] = [ProviderKind::Stripe, ProviderKind::PayPal];

    /// Parse a provider tag (case-insensitive)
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        match tag.as_str() {
            "stripe" => ProviderKind::Stripe,
            "paypal" => ProviderKind::PayPal,
            "square" => ProviderKind::Square,
            "epaymints" => ProviderKind::EPayMints,
            "kingdomfunding" => ProviderKind::KingdomFunding,
            _ => ProviderKind::Other(tag),
        }
    }

    /// Canonical lowercase tag
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::PayPal => "paypal",
            ProviderKind::Square => "square",
            ProviderKind::EPayMints => "epaymints",
            ProviderKind::KingdomFunding => "kingdomfunding",
            ProviderKind::Other(tag) => tag,
        }
    }

    /// True for providers that can never be removed from the registry
    pub fn is_mandatory(&self) -> bool {
        matches!(self, ProviderKind::Stripe | ProviderKind::PayPal)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ProviderKind {
    fn from(tag: &str) -> Self {
        ProviderKind::parse(tag)
    }
}

/// A tenant's stored configuration for one payment-provider account.
///
/// `private_key` and `webhook_key` hold ciphertext; use
/// [`ConfigBuilder`](crate::config::ConfigBuilder) to obtain plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    /// Unique within the tenant's gateway set
    pub id: String,

    /// Owning tenant
    pub church_id: String,

    /// Provider tag (case-insensitive)
    pub provider: String,

    #[serde(default)]
    pub public_key: String,

    /// Encrypted at rest
    #[serde(default)]
    pub private_key: Option<String>,

    /// Encrypted at rest
    #[serde(default)]
    pub webhook_key: Option<String>,

    #[serde(default)]
    pub merchant_id: Option<String>,

    #[serde(default)]
    pub product_id: Option<String>,

    /// Opaque provider-specific settings
    #[serde(default)]
    pub settings: Option<serde_json::Value>,

    /// Free-form environment tag ("production", "sandbox", ...)
    #[serde(default)]
    pub environment: Option<String>,
}

impl Gateway {
    /// Create a gateway with required fields
    pub fn new(
        id: impl Into<String>,
        church_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            church_id: church_id.into(),
            provider: provider.into(),
            public_key: String::new(),
            private_key: None,
            webhook_key: None,
            merchant_id: None,
            product_id: None,
            settings: None,
            environment: None,
        }
    }

    /// Builder: set environment tag
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Builder: set public key
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = key.into();
        self
    }

    /// Builder: set encrypted private key
    pub fn with_private_key(mut self, ciphertext: impl Into<String>) -> Self {
        self.private_key = Some(ciphertext.into());
        self
    }

    /// Builder: set encrypted webhook key
    pub fn with_webhook_key(mut self, ciphertext: impl Into<String>) -> Self {
        self.webhook_key = Some(ciphertext.into());
        self
    }

    /// Builder: set product id
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Builder: set raw settings
    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Parsed provider tag
    pub fn kind(&self) -> ProviderKind {
        ProviderKind::parse(&self.provider)
    }
}

/// Runtime view of one [`Gateway`] for one call.
///
/// Holds decrypted secrets: never persist, cache or log it.
/// `Debug` redacts the secret fields.
#[derive(Clone)]
pub struct GatewayConfig {
    pub gateway_id: String,
    pub church_id: String,
    pub provider: ProviderKind,
    pub public_key: String,
    pub private_key: String,
    /// Only populated for providers that split merchant id from secret
    pub merchant_id: Option<String>,
    pub webhook_key: String,
    pub product_id: Option<String>,
    pub settings: Option<ValidatedSettings>,
    pub environment: Option<String>,
}

impl GatewayConfig {
    /// True when the gateway is tagged for a non-production environment
    pub fn is_sandbox(&self) -> bool {
        matches!(
            self.environment.as_deref().map(str::to_lowercase).as_deref(),
            Some("sandbox") | Some("test")
        )
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_id", &self.gateway_id)
            .field("church_id", &self.church_id)
            .field("provider", &self.provider)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("merchant_id", &self.merchant_id.as_ref().map(|_| "<redacted>"))
            .field("webhook_key", &"<redacted>")
            .field("product_id", &self.product_id)
            .field("environment", &self.environment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse_is_case_insensitive() {
        assert_eq!(ProviderKind::parse("STRIPE"), ProviderKind::Stripe);
        assert_eq!(ProviderKind::parse("PayPal"), ProviderKind::PayPal);
        assert_eq!(ProviderKind::parse(" ePayMints "), ProviderKind::EPayMints);
        assert_eq!(
            ProviderKind::parse("Venmo"),
            ProviderKind::Other("venmo".to_string())
        );
    }

    #[test]
    fn test_mandatory_providers() {
        assert!(ProviderKind::Stripe.is_mandatory());
        assert!(ProviderKind::PayPal.is_mandatory());
        assert!(!ProviderKind::Square.is_mandatory());
        assert!(!ProviderKind::Other("custom".into()).is_mandatory());
    }

    #[test]
    fn test_gateway_deserializes_camel_case() {
        let gateway: Gateway = serde_json::from_value(serde_json::json!({
            "id": "gw_1",
            "churchId": "church_1",
            "provider": "Stripe",
            "publicKey": "pk_test_1",
            "privateKey": "v1:abc",
            "environment": "sandbox"
        }))
        .unwrap();

        assert_eq!(gateway.kind(), ProviderKind::Stripe);
        assert_eq!(gateway.church_id, "church_1");
        assert!(gateway.webhook_key.is_none());
        assert!(gateway.settings.is_none());
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = GatewayConfig {
            gateway_id: "gw_1".into(),
            church_id: "church_1".into(),
            provider: ProviderKind::Stripe,
            public_key: "pk_test_1".into(),
            private_key: "sk_test_secret".into(),
            merchant_id: None,
            webhook_key: "whsec_secret".into(),
            product_id: None,
            settings: None,
            environment: Some("Sandbox".into()),
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk_test_secret"));
        assert!(!rendered.contains("whsec_secret"));
        assert!(config.is_sandbox());
    }
}
