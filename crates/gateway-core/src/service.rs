//! # Gateway Service
//!
//! Orchestrator composing resolution, registry lookup and config building.
//! Callers get one method per business operation and never branch on
//! provider identity:
//!
//! ```text
//! (church_id, options) ─► repository ─► resolver ─► Gateway
//! Gateway ─► ConfigBuilder ─► GatewayConfig ┐
//! Gateway ─► ProviderRegistry ─► provider ──┴─► operation
//! ```
//!
//! Errors raised by a provider during the remote call pass through
//! unchanged; nothing here retries or caches.

use crate::capabilities::{capabilities_for, ProviderCapabilities};
use crate::config::ConfigBuilder;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{Gateway, GatewayConfig};
use crate::ledger::{DonationStatus, GivingLedger};
use crate::provider::{
    BankAccountUpdate, BoxedGatewayProvider, CardUpdate, ChargeRequest, ChargeResult,
    OptionalOperation, OrderRequest, PlanRequest, ProviderEvent, SubscriptionRequest,
    SubscriptionResult, WebhookEndpoint, WebhookHeaders, WebhookResult,
};
use crate::registry::ProviderRegistry;
use crate::repository::GatewayRepository;
use crate::resolver::{resolve, ResolutionFailure, ResolveOptions};
use crate::settings::ValidatedSettings;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Currency used for fee calculation when neither caller nor gateway give one
pub const DEFAULT_FEE_CURRENCY: &str = "usd";

#[derive(Clone)]
pub struct GatewayService {
    registry: Arc<ProviderRegistry>,
    config_builder: ConfigBuilder,
    repository: Arc<dyn GatewayRepository>,
}

impl GatewayService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config_builder: ConfigBuilder,
        repository: Arc<dyn GatewayRepository>,
    ) -> Self {
        Self {
            registry,
            config_builder,
            repository,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Load and resolve the gateway a tenant's request should use.
    ///
    /// The returned gateway's settings are replaced by their narrowed form.
    #[instrument(skip(self, options), fields(provider = ?options.provider, gateway_id = ?options.gateway_id))]
    pub async fn gateway_for_church(
        &self,
        church_id: &str,
        options: &ResolveOptions,
    ) -> GatewayResult<Gateway> {
        if church_id.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "churchId is required to resolve a payment gateway".to_string(),
            ));
        }

        let records = self.repository.load_all(church_id).await?;
        let gateways = self.repository.convert_all_to_model(church_id, records);

        if gateways.is_empty() {
            return Err(GatewayError::GatewayNotFound {
                church_id: church_id.to_string(),
                message: format!("No payment gateway configured for church {}.", church_id),
            });
        }

        let selected = resolve(&gateways, options)
            .map_err(|failure| resolution_error(church_id, options, failure))?;

        debug!(gateway_id = %selected.id, provider = %selected.provider, "Resolved gateway");

        let mut gateway = selected.clone();
        gateway.settings = ValidatedSettings::validate(&gateway.kind(), gateway.settings.as_ref())
            .map(|settings| settings.to_value());
        Ok(gateway)
    }

    /// Provider implementation for a gateway
    pub fn provider_for(&self, gateway: &Gateway) -> GatewayResult<BoxedGatewayProvider> {
        self.registry.get_provider(&gateway.provider)
    }

    /// Runtime config for a gateway
    pub fn config_for(&self, gateway: &Gateway) -> GatewayConfig {
        self.config_builder.build_config(gateway)
    }

    /// Static capability descriptor for a gateway's provider
    pub fn capabilities(&self, gateway: &Gateway) -> Option<&'static ProviderCapabilities> {
        capabilities_for(gateway)
    }

    fn prepare(&self, gateway: &Gateway) -> GatewayResult<(BoxedGatewayProvider, GatewayConfig)> {
        let provider = self.provider_for(gateway)?;
        Ok((provider, self.config_for(gateway)))
    }

    fn require(
        &self,
        gateway: &Gateway,
        operation: OptionalOperation,
    ) -> GatewayResult<BoxedGatewayProvider> {
        let provider = self.provider_for(gateway)?;
        let permitted = capabilities_for(gateway).map_or(true, |caps| caps.permits(operation));
        if !provider.supports(operation) || !permitted {
            warn!(
                provider = %provider.name(),
                gateway_id = %gateway.id,
                operation = %operation,
                "Optional operation not supported"
            );
            return Err(GatewayError::unsupported(provider.name(), operation.as_str()));
        }
        debug!(provider = %provider.name(), operation = %operation, "Dispatching optional operation");
        Ok(provider)
    }

    fn require_with_config(
        &self,
        gateway: &Gateway,
        operation: OptionalOperation,
    ) -> GatewayResult<(BoxedGatewayProvider, GatewayConfig)> {
        let provider = self.require(gateway, operation)?;
        Ok((provider, self.config_for(gateway)))
    }

    // =========================================================================
    // Webhooks
    // =========================================================================

    #[instrument(skip(self, gateway), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn create_webhook(
        &self,
        gateway: &Gateway,
        webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint> {
        let (provider, config) = self.prepare(gateway)?;
        provider.create_webhook_endpoint(&config, webhook_url).await
    }

    #[instrument(skip(self, gateway), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn delete_webhooks(&self, gateway: &Gateway, church_id: &str) -> GatewayResult<()> {
        let (provider, config) = self.prepare(gateway)?;
        provider.delete_webhooks_by_church_id(&config, church_id).await
    }

    #[instrument(skip(self, gateway, headers, body), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn verify_webhook(
        &self,
        gateway: &Gateway,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> GatewayResult<WebhookResult> {
        let (provider, config) = self.prepare(gateway)?;
        provider.verify_webhook_signature(&config, headers, body).await
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[instrument(skip(self, gateway, charge), fields(provider = %gateway.provider, gateway_id = %gateway.id, amount = charge.amount))]
    pub async fn process_charge(
        &self,
        gateway: &Gateway,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        let (provider, config) = self.prepare(gateway)?;
        provider.process_charge(&config, charge).await
    }

    #[instrument(skip(self, gateway, subscription), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn create_subscription(
        &self,
        gateway: &Gateway,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let (provider, config) = self.prepare(gateway)?;
        provider.create_subscription(&config, subscription).await
    }

    #[instrument(skip(self, gateway, subscription), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn update_subscription(
        &self,
        gateway: &Gateway,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let (provider, config) = self.prepare(gateway)?;
        provider.update_subscription(&config, subscription).await
    }

    #[instrument(skip(self, gateway), fields(provider = %gateway.provider, gateway_id = %gateway.id))]
    pub async fn cancel_subscription(
        &self,
        gateway: &Gateway,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> GatewayResult<()> {
        let (provider, config) = self.prepare(gateway)?;
        provider
            .cancel_subscription(&config, subscription_id, reason)
            .await
    }

    /// Fee for `amount` minor units; currency defaults to `usd`
    pub async fn calculate_fees(
        &self,
        gateway: &Gateway,
        amount: i64,
        church_id: &str,
        currency: Option<&str>,
    ) -> GatewayResult<i64> {
        let provider = self.provider_for(gateway)?;
        let currency = currency.unwrap_or(DEFAULT_FEE_CURRENCY).to_lowercase();
        provider.calculate_fees(amount, church_id, &currency).await
    }

    // =========================================================================
    // Event logging
    // =========================================================================

    pub async fn log_event(
        &self,
        gateway: &Gateway,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        let provider = self.provider_for(gateway)?;
        provider.log_event(church_id, event, ledger).await
    }

    pub async fn log_donation(
        &self,
        gateway: &Gateway,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
        status: DonationStatus,
    ) -> GatewayResult<Option<String>> {
        let (provider, config) = self.prepare(gateway)?;
        provider
            .log_donation(&config, church_id, event, ledger, status)
            .await
    }

    pub async fn update_donation_status(
        &self,
        gateway: &Gateway,
        church_id: &str,
        transaction_id: &str,
        status: DonationStatus,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        let provider = self.require(gateway, OptionalOperation::UpdateDonationStatus)?;
        provider
            .update_donation_status(church_id, transaction_id, status, ledger)
            .await
    }

    // =========================================================================
    // Products and customers
    // =========================================================================

    pub async fn create_product(
        &self,
        gateway: &Gateway,
        church_id: &str,
    ) -> GatewayResult<Option<String>> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::CreateProduct)?;
        provider.create_product(&config, church_id).await
    }

    pub async fn create_customer(
        &self,
        gateway: &Gateway,
        email: &str,
        name: &str,
    ) -> GatewayResult<String> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::CreateCustomer)?;
        provider.create_customer(&config, email, name).await
    }

    pub async fn get_customer_subscriptions(
        &self,
        gateway: &Gateway,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::GetCustomerSubscriptions)?;
        provider.get_customer_subscriptions(&config, customer_id).await
    }

    pub async fn get_customer_payment_methods(
        &self,
        gateway: &Gateway,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::GetCustomerPaymentMethods)?;
        provider.get_customer_payment_methods(&config, customer_id).await
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    pub async fn attach_payment_method(
        &self,
        gateway: &Gateway,
        payment_method_id: &str,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::AttachPaymentMethod)?;
        provider
            .attach_payment_method(&config, payment_method_id, customer_id)
            .await
    }

    pub async fn detach_payment_method(
        &self,
        gateway: &Gateway,
        payment_method_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::DetachPaymentMethod)?;
        provider.detach_payment_method(&config, payment_method_id).await
    }

    pub async fn update_card(
        &self,
        gateway: &Gateway,
        payment_method_id: &str,
        card: &CardUpdate,
    ) -> GatewayResult<Value> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::UpdateCard)?;
        provider.update_card(&config, payment_method_id, card).await
    }

    // =========================================================================
    // Bank accounts
    // =========================================================================

    pub async fn create_bank_account(
        &self,
        gateway: &Gateway,
        customer_id: &str,
        source_token: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::CreateBankAccount)?;
        provider
            .create_bank_account(&config, customer_id, source_token)
            .await
    }

    pub async fn update_bank(
        &self,
        gateway: &Gateway,
        bank_account_id: &str,
        bank: &BankAccountUpdate,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::UpdateBank)?;
        provider
            .update_bank(&config, bank_account_id, bank, customer_id)
            .await
    }

    pub async fn verify_bank(
        &self,
        gateway: &Gateway,
        bank_account_id: &str,
        amounts: &[i64],
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::VerifyBank)?;
        provider
            .verify_bank(&config, bank_account_id, amounts, customer_id)
            .await
    }

    pub async fn delete_bank_account(
        &self,
        gateway: &Gateway,
        customer_id: &str,
        bank_account_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::DeleteBankAccount)?;
        provider
            .delete_bank_account(&config, customer_id, bank_account_id)
            .await
    }

    // =========================================================================
    // Setup intents
    // =========================================================================

    pub async fn create_setup_intent(
        &self,
        gateway: &Gateway,
        customer_id: Option<&str>,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::CreateSetupIntent)?;
        provider.create_setup_intent(&config, customer_id).await
    }

    pub async fn create_ach_setup_intent(
        &self,
        gateway: &Gateway,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::CreateAchSetupIntent)?;
        provider.create_ach_setup_intent(&config, customer_id).await
    }

    pub async fn confirm_setup_intent(
        &self,
        gateway: &Gateway,
        setup_intent_id: &str,
        payment_method_id: &str,
    ) -> GatewayResult<Value> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::ConfirmSetupIntent)?;
        provider
            .confirm_setup_intent(&config, setup_intent_id, payment_method_id)
            .await
    }

    // =========================================================================
    // Provider-specific
    // =========================================================================

    pub async fn generate_client_token(&self, gateway: &Gateway) -> GatewayResult<String> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::GenerateClientToken)?;
        provider.generate_client_token(&config).await
    }

    pub async fn create_order(&self, gateway: &Gateway, order: &OrderRequest) -> GatewayResult<Value> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::CreateOrder)?;
        provider.create_order(&config, order).await
    }

    pub async fn create_subscription_plan(
        &self,
        gateway: &Gateway,
        plan: &PlanRequest,
    ) -> GatewayResult<String> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::CreateSubscriptionPlan)?;
        provider.create_subscription_plan(&config, plan).await
    }

    pub async fn create_subscription_with_plan(
        &self,
        gateway: &Gateway,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let (provider, config) =
            self.require_with_config(gateway, OptionalOperation::CreateSubscriptionWithPlan)?;
        provider
            .create_subscription_with_plan(&config, subscription)
            .await
    }

    pub async fn get_charge(&self, gateway: &Gateway, charge_id: &str) -> GatewayResult<Value> {
        let (provider, config) = self.require_with_config(gateway, OptionalOperation::GetCharge)?;
        provider.get_charge(&config, charge_id).await
    }
}

fn resolution_error(
    church_id: &str,
    options: &ResolveOptions,
    failure: ResolutionFailure,
) -> GatewayError {
    let church_id = church_id.to_string();

    if let Some(gateway_id) = &options.gateway_id {
        return GatewayError::GatewayNotFound {
            message: format!(
                "Gateway {} is not configured for church {}.",
                gateway_id, church_id
            ),
            church_id,
        };
    }

    match (failure, options.provider.as_deref()) {
        (ResolutionFailure::Ambiguous, provider) => {
            let qualifier = provider.map(|p| format!("{} ", p)).unwrap_or_default();
            GatewayError::AmbiguousGateway {
                message: format!(
                    "Multiple {}payment gateways are configured for church {}. Provide a gatewayId or environment preference to disambiguate.",
                    qualifier, church_id
                ),
                church_id,
            }
        }
        (ResolutionFailure::NotFound, Some(provider)) => GatewayError::GatewayNotFound {
            message: format!("No {} gateway configured for church {}.", provider, church_id),
            church_id,
        },
        (ResolutionFailure::NotFound, None) => GatewayError::GatewayNotFound {
            message: format!("No payment gateway configured for church {}.", church_id),
            church_id,
        },
    }
}
