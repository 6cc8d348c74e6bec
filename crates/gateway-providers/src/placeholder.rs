//! # Placeholder Providers
//!
//! Stand-ins for providers that are registered behind feature flags but
//! not integrated yet (Square, ePayMints, KingdomFunding). Webhook setup
//! succeeds so tenants can be configured; money-moving calls fail with a
//! provider error.

use async_trait::async_trait;
use gateway_core::{
    ChargeRequest, ChargeResult, DonationStatus, GatewayConfig, GatewayError, GatewayProvider,
    GatewayResult, GivingLedger, OptionalOperation, ProviderEvent, ProviderKind,
    SubscriptionRequest, SubscriptionResult, WebhookEndpoint, WebhookHeaders, WebhookResult,
};
use tracing::debug;

pub struct PlaceholderProvider {
    kind: ProviderKind,
}

impl PlaceholderProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    fn not_implemented(&self, operation: &str) -> GatewayError {
        GatewayError::provider(
            self.kind.as_str(),
            format!("{} is not implemented for {}", operation, self.kind),
        )
    }
}

#[async_trait]
impl GatewayProvider for PlaceholderProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn supported_operations(&self) -> &'static [OptionalOperation] {
        match self.kind {
            // Nothing to create; lets tenant configuration proceed
            ProviderKind::KingdomFunding => &[OptionalOperation::CreateProduct],
            _ => &[],
        }
    }

    async fn create_webhook_endpoint(
        &self,
        _config: &GatewayConfig,
        _webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint> {
        Ok(WebhookEndpoint {
            id: format!("{}-webhook-placeholder", self.kind.as_str()),
            secret: None,
        })
    }

    async fn delete_webhooks_by_church_id(
        &self,
        _config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<()> {
        debug!(provider = %self.kind, church_id = %church_id, "No webhooks to delete");
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
        _config: &GatewayConfig,
        _charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        Err(self.not_implemented("process_charge"))
    }

    async fn create_subscription(
        &self,
        _config: &GatewayConfig,
        _subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        Err(self.not_implemented("create_subscription"))
    }

    async fn update_subscription(
        &self,
        _config: &GatewayConfig,
        _subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        Err(self.not_implemented("update_subscription"))
    }

    async fn cancel_subscription(
        &self,
        _config: &GatewayConfig,
        _subscription_id: &str,
        _reason: Option<&str>,
    ) -> GatewayResult<()> {
        Err(self.not_implemented("cancel_subscription"))
    }

    async fn calculate_fees(
        &self,
        _amount: i64,
        _church_id: &str,
        _currency: &str,
    ) -> GatewayResult<i64> {
        Ok(0)
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
        Err(self.not_implemented("log_donation"))
    }

    async fn create_product(
        &self,
        _config: &GatewayConfig,
        _church_id: &str,
    ) -> GatewayResult<Option<String>> {
        Ok(None)
    }
}
