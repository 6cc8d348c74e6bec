//! # File Gateway Repository
//!
//! Reads tenant gateways from a TOML file:
//!
//! ```toml
//! [[gateways]]
//! id = "gw_stripe_live"
//! churchId = "church_1"
//! provider = "stripe"
//! publicKey = "pk_live_..."
//! privateKey = "v1:..."        # sealed with the secret box
//! environment = "production"
//!
//! [gateways.settings]
//! statementDescriptor = "GRACE CHURCH"
//! ```
//!
//! The file is re-read on every load, so edits apply without a restart.

use async_trait::async_trait;
use gateway_core::{Gateway, GatewayError, GatewayRepository, GatewayResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
pub struct GatewayFile {
    #[serde(default)]
    pub gateways: Vec<Gateway>,
}

impl GatewayFile {
    pub fn parse(content: &str) -> GatewayResult<Self> {
        toml::from_str(content)
            .map_err(|e| GatewayError::Repository(format!("Invalid gateway file: {}", e)))
    }
}

pub struct TomlGatewayRepository {
    path: PathBuf,
}

impl TomlGatewayRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> GatewayResult<GatewayFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => GatewayFile::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Gateway file not found, no gateways configured");
                Ok(GatewayFile::default())
            }
            Err(e) => Err(GatewayError::Repository(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl GatewayRepository for TomlGatewayRepository {
    async fn load_all(&self, church_id: &str) -> GatewayResult<Vec<Gateway>> {
        let file = self.read().await?;
        let gateways: Vec<Gateway> = file
            .gateways
            .into_iter()
            .filter(|gateway| gateway.church_id == church_id)
            .collect();
        debug!(church_id = %church_id, count = gateways.len(), "Loaded gateways");
        Ok(gateways)
    }

    /// Hand-edited files drift: trim tags and drop records without an id.
    fn convert_all_to_model(&self, church_id: &str, records: Vec<Gateway>) -> Vec<Gateway> {
        records
            .into_iter()
            .filter_map(|mut gateway| {
                gateway.id = gateway.id.trim().to_string();
                if gateway.id.is_empty() {
                    warn!(church_id = %church_id, "Skipping gateway without id");
                    return None;
                }
                gateway.provider = gateway.provider.trim().to_lowercase();
                gateway.environment = gateway
                    .environment
                    .map(|env| env.trim().to_string())
                    .filter(|env| !env.is_empty());
                Some(gateway)
            })
            .collect()
    }
}
