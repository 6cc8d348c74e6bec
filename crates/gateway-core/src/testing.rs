//! In-crate test doubles for the registry and orchestrator.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{GatewayConfig, ProviderKind};
use crate::ledger::{DonationStatus, GivingLedger};
use crate::provider::{
    BoxedGatewayProvider, ChargeRequest, ChargeResult, GatewayProvider, OptionalOperation,
    ProviderEvent, SubscriptionRequest, SubscriptionResult, WebhookEndpoint, WebhookHeaders,
    WebhookResult,
};
use crate::registry::ProviderFactory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Provider answering every mandatory call with canned data
pub struct StubProvider {
    name: String,
    operations: &'static [OptionalOperation],
}

impl StubProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            operations: &[],
        }
    }

    pub fn with_operations(mut self, operations: &'static [OptionalOperation]) -> Self {
        self.operations = operations;
        self
    }
}

#[async_trait]
impl GatewayProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_operations(&self) -> &'static [OptionalOperation] {
        self.operations
    }

    async fn create_webhook_endpoint(
        &self,
        config: &GatewayConfig,
        _webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint> {
        Ok(WebhookEndpoint {
            id: format!("we_{}", config.gateway_id),
            secret: None,
        })
    }

    async fn delete_webhooks_by_church_id(
        &self,
        _config: &GatewayConfig,
        _church_id: &str,
    ) -> GatewayResult<()> {
        Ok(())
    }

    async fn verify_webhook_signature(
        &self,
        _config: &GatewayConfig,
        _headers: &WebhookHeaders,
        _body: &[u8],
    ) -> GatewayResult<WebhookResult> {
        Ok(WebhookResult::ignored())
    }

    async fn process_charge(
        &self,
        config: &GatewayConfig,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        Ok(ChargeResult {
            success: true,
            transaction_id: format!("tx_{}", self.name),
            data: serde_json::json!({
                "amount": charge.amount,
                "privateKey": config.private_key,
            }),
        })
    }

    async fn create_subscription(
        &self,
        _config: &GatewayConfig,
        _subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        Ok(SubscriptionResult {
            success: true,
            subscription_id: "sub_stub".to_string(),
            data: serde_json::Value::Null,
        })
    }

    async fn update_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        self.create_subscription(config, subscription).await
    }

    async fn cancel_subscription(
        &self,
        _config: &GatewayConfig,
        _subscription_id: &str,
        _reason: Option<&str>,
    ) -> GatewayResult<()> {
        Ok(())
    }

    async fn calculate_fees(
        &self,
        amount: i64,
        _church_id: &str,
        currency: &str,
    ) -> GatewayResult<i64> {
        if currency != "usd" {
            return Err(GatewayError::InvalidRequest(format!("unexpected currency {}", currency)));
        }
        Ok(amount / 100)
    }

    async fn log_event(
        &self,
        _church_id: &str,
        _event: &ProviderEvent,
        _ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        Ok(())
    }

    async fn log_donation(
        &self,
        _config: &GatewayConfig,
        _church_id: &str,
        _event: &ProviderEvent,
        _ledger: &dyn GivingLedger,
        _status: DonationStatus,
    ) -> GatewayResult<Option<String>> {
        Ok(None)
    }

    async fn create_product(
        &self,
        _config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<Option<String>> {
        Ok(Some(format!("prod_{}", church_id)))
    }
}

/// Factory building [`StubProvider`]s and counting how often each kind was built
#[derive(Default)]
pub struct StubFactory {
    missing: Vec<ProviderKind>,
    created: Mutex<HashMap<String, usize>>,
}

impl StubFactory {
    /// Factory with no implementation for `kinds`
    pub fn without(kinds: &[ProviderKind]) -> Self {
        Self {
            missing: kinds.to_vec(),
            created: Mutex::new(HashMap::new()),
        }
    }

    pub fn created(&self, name: &str) -> usize {
        self.created
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}

impl ProviderFactory for StubFactory {
    fn create(&self, kind: &ProviderKind) -> Option<BoxedGatewayProvider> {
        if self.missing.contains(kind) {
            return None;
        }
        *self
            .created
            .lock()
            .unwrap()
            .entry(kind.as_str().to_string())
            .or_default() += 1;
        Some(Arc::new(StubProvider::new(kind.as_str())))
    }
}
