//! # Application State
//!
//! Environment configuration and the wiring of registry, config builder,
//! repository and orchestrator into one shared value.

use crate::repository::TomlGatewayRepository;
use crate::secrets::{NoKeyDecryptor, SecretBox};
use gateway_core::{ConfigBuilder, FeatureFlags, GatewayService, ProviderRegistry, SecretDecryptor};
use gateway_providers::{BuiltinProviderFactory, ProviderEndpoints};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_GATEWAYS_FILE: &str = "config/gateways.toml";

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub flags: FeatureFlags,
    /// Process-wide key for the KingdomFunding placeholder
    pub kingdomfunding_private_key: Option<String>,
    /// Secret-box key for stored gateway secrets
    pub encryption_key: Option<String>,
    pub gateways_file: PathBuf,
    pub endpoints: ProviderEndpoints,
}

impl AppConfig {
    /// Load from environment variables (and `.env` if present)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            flags: FeatureFlags {
                enable_square: flag("ENABLE_SQUARE"),
                enable_epaymints: flag("ENABLE_EPAYMINTS"),
                enable_kingdomfunding: flag("ENABLE_KINGDOMFUNDING"),
                enable_custom_providers: flag("ENABLE_CUSTOM_GATEWAY_PROVIDERS"),
            },
            kingdomfunding_private_key: non_empty("KINGDOMFUNDING_PRIVATE_KEY"),
            encryption_key: non_empty("GATEWAY_ENCRYPTION_KEY"),
            gateways_file: env::var("GATEWAYS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_GATEWAYS_FILE)),
            endpoints: ProviderEndpoints::from_env(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("flags", &self.flags)
            .field("kingdomfunding_private_key", &self.kingdomfunding_private_key.as_ref().map(|_| "***"))
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "***"))
            .field("gateways_file", &self.gateways_file)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// `"true"` (any case) enables a flag; anything else disables it
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn flag(name: &str) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ProviderRegistry>,
    pub service: GatewayService,
    /// Present when an encryption key is configured
    pub secret_box: Option<SecretBox>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let factory = BuiltinProviderFactory::new(config.endpoints.clone())?;
        let registry = Arc::new(ProviderRegistry::new(Arc::new(factory), config.flags)?);

        let secret_box = config
            .encryption_key
            .as_deref()
            .map(SecretBox::new)
            .transpose()?;
        let decryptor: Arc<dyn SecretDecryptor> = match &secret_box {
            Some(secret_box) => Arc::new(secret_box.clone()),
            None => {
                warn!("GATEWAY_ENCRYPTION_KEY not set; stored secrets will not decrypt");
                Arc::new(NoKeyDecryptor)
            }
        };

        let mut config_builder = ConfigBuilder::new(decryptor);
        if let Some(key) = &config.kingdomfunding_private_key {
            config_builder = config_builder.with_kingdomfunding_private_key(key.clone());
        }

        let repository = Arc::new(TomlGatewayRepository::new(config.gateways_file.clone()));
        let service = GatewayService::new(registry.clone(), config_builder, repository);

        info!(
            providers = ?registry.supported_providers(),
            gateways_file = %config.gateways_file.display(),
            "Gateway service ready"
        );

        Ok(Self {
            config,
            registry,
            service,
            secret_box,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(AppConfig::from_env())
    }
}
