//! # Gateway Repository
//!
//! Persistence collaborator the orchestrator loads a tenant's gateways from.

use crate::error::GatewayResult;
use crate::gateway::Gateway;
use async_trait::async_trait;

#[async_trait]
pub trait GatewayRepository: Send + Sync {
    /// Raw records for one tenant
    async fn load_all(&self, church_id: &str) -> GatewayResult<Vec<Gateway>>;

    /// Normalise raw records into the model. Default: records are used as-is.
    fn convert_all_to_model(&self, church_id: &str, records: Vec<Gateway>) -> Vec<Gateway> {
        let _ = church_id;
        records
    }
}
