//! # Gateway Config Builder
//!
//! Turns a stored [`Gateway`] into the per-call [`GatewayConfig`] a
//! provider consumes, decrypting its secrets on the way.
//!
//! A secret that fails to decrypt is logged and becomes an empty string, so
//! one broken secret never blocks enumerating or diagnosing a tenant's set.

use crate::error::GatewayResult;
use crate::gateway::{Gateway, GatewayConfig, ProviderKind};
use crate::settings::ValidatedSettings;
use std::sync::Arc;
use tracing::error;

/// Decryption collaborator for secrets stored on gateway records
pub trait SecretDecryptor: Send + Sync {
    /// Fails with [`GatewayError::Decryption`](crate::GatewayError::Decryption) on malformed input
    fn decrypt(&self, ciphertext: &str) -> GatewayResult<String>;
}

/// Builds [`GatewayConfig`]s from stored gateways
#[derive(Clone)]
pub struct ConfigBuilder {
    decryptor: Arc<dyn SecretDecryptor>,
    /// Process-wide private key for the KingdomFunding placeholder integration
    kingdomfunding_private_key: Option<String>,
}

impl ConfigBuilder {
    pub fn new(decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self {
            decryptor,
            kingdomfunding_private_key: None,
        }
    }

    /// Builder: set the KingdomFunding private key
    pub fn with_kingdomfunding_private_key(mut self, key: impl Into<String>) -> Self {
        self.kingdomfunding_private_key = Some(key.into());
        self
    }

    /// Build the runtime config for one gateway. Never fails.
    pub fn build_config(&self, gateway: &Gateway) -> GatewayConfig {
        let kind = gateway.kind();
        let decrypted_secret = self.decrypt_if_present(gateway, gateway.private_key.as_deref());
        let webhook_key = self.decrypt_if_present(gateway, gateway.webhook_key.as_deref());

        // KingdomFunding stores its merchant id where other providers keep the
        // secret; the real key comes from process configuration.
        let (private_key, merchant_id) = match kind {
            ProviderKind::KingdomFunding => (
                self.kingdomfunding_private_key.clone().unwrap_or_default(),
                Some(decrypted_secret).filter(|secret| !secret.is_empty()),
            ),
            _ => (decrypted_secret, None),
        };

        let settings = ValidatedSettings::validate(&kind, gateway.settings.as_ref());

        GatewayConfig {
            gateway_id: gateway.id.clone(),
            church_id: gateway.church_id.clone(),
            provider: kind,
            public_key: gateway.public_key.clone(),
            private_key,
            merchant_id,
            webhook_key,
            product_id: gateway.product_id.clone(),
            settings,
            environment: gateway.environment.clone(),
        }
    }

    fn decrypt_if_present(&self, gateway: &Gateway, ciphertext: Option<&str>) -> String {
        let Some(ciphertext) = ciphertext.filter(|value| !value.is_empty()) else {
            return String::new();
        };

        match self.decryptor.decrypt(ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                error!(
                    provider = %gateway.provider,
                    gateway_id = %gateway.id,
                    error = %e,
                    "Failed to decrypt gateway secret"
                );
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    /// Accepts "enc:<plaintext>", rejects everything else
    struct PrefixDecryptor;

    impl SecretDecryptor for PrefixDecryptor {
        fn decrypt(&self, ciphertext: &str) -> GatewayResult<String> {
            ciphertext
                .strip_prefix("enc:")
                .map(String::from)
                .ok_or_else(|| GatewayError::Decryption("bad ciphertext".to_string()))
        }
    }

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new(Arc::new(PrefixDecryptor))
    }

    #[test]
    fn test_decrypts_secrets() {
        let gateway = Gateway::new("gw_1", "church_1", "stripe")
            .with_public_key("pk_test_1")
            .with_private_key("enc:sk_test_1")
            .with_webhook_key("enc:whsec_1")
            .with_environment("sandbox");

        let config = builder().build_config(&gateway);
        assert_eq!(config.private_key, "sk_test_1");
        assert_eq!(config.webhook_key, "whsec_1");
        assert_eq!(config.public_key, "pk_test_1");
        assert!(config.merchant_id.is_none());
        assert_eq!(config.environment.as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_decryption_failure_degrades_to_empty() {
        let gateway = Gateway::new("gw_1", "church_1", "stripe")
            .with_private_key("garbage")
            .with_webhook_key("enc:whsec_1");

        let config = builder().build_config(&gateway);
        assert_eq!(config.private_key, "");
        assert_eq!(config.webhook_key, "whsec_1");
    }

    #[test]
    fn test_missing_secrets_are_empty() {
        let gateway = Gateway::new("gw_1", "church_1", "paypal");
        let config = builder().build_config(&gateway);
        assert_eq!(config.private_key, "");
        assert_eq!(config.webhook_key, "");
    }

    #[test]
    fn test_kingdomfunding_uses_process_key() {
        let gateway = Gateway::new("gw_kf", "church_1", "KingdomFunding")
            .with_private_key("enc:merchant_42");

        let config = builder()
            .with_kingdomfunding_private_key("kf_process_key")
            .build_config(&gateway);

        assert_eq!(config.private_key, "kf_process_key");
        assert_eq!(config.merchant_id.as_deref(), Some("merchant_42"));
    }

    #[test]
    fn test_kingdomfunding_without_process_key() {
        let gateway = Gateway::new("gw_kf", "church_1", "kingdomfunding");
        let config = builder().build_config(&gateway);
        assert_eq!(config.private_key, "");
        assert!(config.merchant_id.is_none());
    }

    #[test]
    fn test_settings_are_validated() {
        let gateway = Gateway::new("gw_1", "church_1", "stripe")
            .with_settings(serde_json::json!({ "statementDescriptor": "GIVE" }));

        let config = builder().build_config(&gateway);
        let settings = config.settings.unwrap();
        assert_eq!(
            settings.as_stripe().unwrap().statement_descriptor.as_deref(),
            Some("GIVE")
        );
    }
}
