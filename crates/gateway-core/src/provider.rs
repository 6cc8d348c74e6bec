//! # Gateway Provider Contract
//!
//! The uniform operation surface every payment provider implements.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  GatewayProvider (trait)                    │
//! │  mandatory: webhooks, charges, subscriptions, fees, logging │
//! │  optional:  declared via supported_operations()             │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┼─────────────────┐
//!          │                 │                 │
//!  ┌───────┴───────┐ ┌───────┴───────┐ ┌───────┴───────┐
//!  │StripeProvider │ │PayPalProvider │ │  Placeholder  │
//!  │               │ │               │ │   providers   │
//!  └───────────────┘ └───────────────┘ └───────────────┘
//! ```
//!
//! Optional operations are data, not probing: a provider lists the ones it
//! implements in [`GatewayProvider::supported_operations`] and the
//! orchestrator checks that list before dispatching. The default bodies only
//! exist so providers never write their own rejection stubs.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::GatewayConfig;
use crate::ledger::{DonationStatus, GivingLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Request headers handed to webhook verification (lowercased names)
pub type WebhookHeaders = HashMap<String, String>;

/// Remote webhook endpoint created for a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A provider event, as received from a webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    pub event_type: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Outcome of webhook signature verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResult {
    /// Signature was valid
    pub success: bool,
    /// The event is one this system acts on
    pub should_process: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<ProviderEvent>,
}

impl WebhookResult {
    /// Valid signature, nothing to do
    pub fn ignored() -> Self {
        Self {
            success: true,
            should_process: false,
            event: None,
        }
    }

    /// Signature did not verify
    pub fn rejected() -> Self {
        Self {
            success: false,
            should_process: false,
            event: None,
        }
    }
}

/// A one-time donation charge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Minor currency units
    pub amount: i64,
    /// Lowercase ISO 4217 code
    pub currency: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    /// Provider-side order to capture (PayPal)
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResult {
    pub success: bool,
    pub transaction_id: String,
    pub data: serde_json::Value,
}

/// Billing interval for recurring donations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Year => "year",
        }
    }
}

/// Create or update a recurring donation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Existing subscription (updates only)
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    /// Provider-side plan (plan-based providers)
    #[serde(default)]
    pub plan_id: Option<String>,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_interval_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResult {
    pub success: bool,
    pub subscription_id: String,
    pub data: serde_json::Value,
}

/// Provider-side billing plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    pub name: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
    /// Provider-side product the plan belongs to
    #[serde(default)]
    pub product_id: Option<String>,
}

/// Provider-side order (PayPal smart buttons)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Card fields that may be changed on a stored card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardUpdate {
    #[serde(default)]
    pub exp_month: Option<u32>,
    #[serde(default)]
    pub exp_year: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Bank account fields that may be changed on a stored account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankAccountUpdate {
    #[serde(default)]
    pub account_holder_name: Option<String>,
    #[serde(default)]
    pub account_holder_type: Option<String>,
}

/// Operations a provider may or may not implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalOperation {
    CreateProduct,
    CreateCustomer,
    GetCustomerSubscriptions,
    GetCustomerPaymentMethods,
    AttachPaymentMethod,
    DetachPaymentMethod,
    UpdateCard,
    CreateBankAccount,
    UpdateBank,
    VerifyBank,
    DeleteBankAccount,
    CreateSetupIntent,
    CreateAchSetupIntent,
    ConfirmSetupIntent,
    GenerateClientToken,
    CreateOrder,
    CreateSubscriptionPlan,
    CreateSubscriptionWithPlan,
    GetCharge,
    UpdateDonationStatus,
}

impl OptionalOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionalOperation::CreateProduct => "create_product",
            OptionalOperation::CreateCustomer => "create_customer",
            OptionalOperation::GetCustomerSubscriptions => "get_customer_subscriptions",
            OptionalOperation::GetCustomerPaymentMethods => "get_customer_payment_methods",
            OptionalOperation::AttachPaymentMethod => "attach_payment_method",
            OptionalOperation::DetachPaymentMethod => "detach_payment_method",
            OptionalOperation::UpdateCard => "update_card",
            OptionalOperation::CreateBankAccount => "create_bank_account",
            OptionalOperation::UpdateBank => "update_bank",
            OptionalOperation::VerifyBank => "verify_bank",
            OptionalOperation::DeleteBankAccount => "delete_bank_account",
            OptionalOperation::CreateSetupIntent => "create_setup_intent",
            OptionalOperation::CreateAchSetupIntent => "create_ach_setup_intent",
            OptionalOperation::ConfirmSetupIntent => "confirm_setup_intent",
            OptionalOperation::GenerateClientToken => "generate_client_token",
            OptionalOperation::CreateOrder => "create_order",
            OptionalOperation::CreateSubscriptionPlan => "create_subscription_plan",
            OptionalOperation::CreateSubscriptionWithPlan => "create_subscription_with_plan",
            OptionalOperation::GetCharge => "get_charge",
            OptionalOperation::UpdateDonationStatus => "update_donation_status",
        }
    }
}

impl fmt::Display for OptionalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for payment provider implementations.
///
/// Operations that mutate remote state are called at most once per logical
/// request; retries, timeouts and backpressure belong to the implementation.
#[allow(unused_variables)]
#[async_trait]
pub trait GatewayProvider: Send + Sync {
    /// Provider tag (for logging and routing)
    fn name(&self) -> &str;

    /// Optional operations this provider implements
    fn supported_operations(&self) -> &'static [OptionalOperation] {
        &[]
    }

    /// Check if an optional operation is implemented
    fn supports(&self, operation: OptionalOperation) -> bool {
        self.supported_operations().contains(&operation)
    }

    // ---- webhook management ----

    async fn create_webhook_endpoint(
        &self,
        config: &GatewayConfig,
        webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint>;

    async fn delete_webhooks_by_church_id(
        &self,
        config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<()>;

    async fn verify_webhook_signature(
        &self,
        config: &GatewayConfig,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> GatewayResult<WebhookResult>;

    // ---- payment processing ----

    async fn process_charge(
        &self,
        config: &GatewayConfig,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult>;

    async fn create_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult>;

    async fn update_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult>;

    async fn cancel_subscription(
        &self,
        config: &GatewayConfig,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> GatewayResult<()>;

    /// Fee in minor units for a donation of `amount` minor units
    async fn calculate_fees(
        &self,
        amount: i64,
        church_id: &str,
        currency: &str,
    ) -> GatewayResult<i64>;

    // ---- event logging ----

    async fn log_event(
        &self,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()>;

    async fn log_donation(
        &self,
        config: &GatewayConfig,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
        status: DonationStatus,
    ) -> GatewayResult<Option<String>>;

    // ---- optional: products and customers ----

    async fn create_product(
        &self,
        config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<Option<String>> {
        Err(self.unsupported(OptionalOperation::CreateProduct))
    }

    async fn create_customer(
        &self,
        config: &GatewayConfig,
        email: &str,
        name: &str,
    ) -> GatewayResult<String> {
        Err(self.unsupported(OptionalOperation::CreateCustomer))
    }

    async fn get_customer_subscriptions(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::GetCustomerSubscriptions))
    }

    async fn get_customer_payment_methods(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::GetCustomerPaymentMethods))
    }

    // ---- optional: payment methods ----

    async fn attach_payment_method(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::AttachPaymentMethod))
    }

    async fn detach_payment_method(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::DetachPaymentMethod))
    }

    async fn update_card(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
        card: &CardUpdate,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::UpdateCard))
    }

    // ---- optional: bank accounts ----

    async fn create_bank_account(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
        source_token: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::CreateBankAccount))
    }

    async fn update_bank(
        &self,
        config: &GatewayConfig,
        bank_account_id: &str,
        bank: &BankAccountUpdate,
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::UpdateBank))
    }

    /// Confirm micro-deposit amounts (minor units)
    async fn verify_bank(
        &self,
        config: &GatewayConfig,
        bank_account_id: &str,
        amounts: &[i64],
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::VerifyBank))
    }

    async fn delete_bank_account(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
        bank_account_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::DeleteBankAccount))
    }

    // ---- optional: setup intents ----

    async fn create_setup_intent(
        &self,
        config: &GatewayConfig,
        customer_id: Option<&str>,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::CreateSetupIntent))
    }

    async fn create_ach_setup_intent(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::CreateAchSetupIntent))
    }

    async fn confirm_setup_intent(
        &self,
        config: &GatewayConfig,
        setup_intent_id: &str,
        payment_method_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::ConfirmSetupIntent))
    }

    // ---- optional: provider-specific ----

    async fn generate_client_token(&self, config: &GatewayConfig) -> GatewayResult<String> {
        Err(self.unsupported(OptionalOperation::GenerateClientToken))
    }

    async fn create_order(
        &self,
        config: &GatewayConfig,
        order: &OrderRequest,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::CreateOrder))
    }

    async fn create_subscription_plan(
        &self,
        config: &GatewayConfig,
        plan: &PlanRequest,
    ) -> GatewayResult<String> {
        Err(self.unsupported(OptionalOperation::CreateSubscriptionPlan))
    }

    async fn create_subscription_with_plan(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        Err(self.unsupported(OptionalOperation::CreateSubscriptionWithPlan))
    }

    async fn get_charge(
        &self,
        config: &GatewayConfig,
        charge_id: &str,
    ) -> GatewayResult<serde_json::Value> {
        Err(self.unsupported(OptionalOperation::GetCharge))
    }

    async fn update_donation_status(
        &self,
        church_id: &str,
        transaction_id: &str,
        status: DonationStatus,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        Err(self.unsupported(OptionalOperation::UpdateDonationStatus))
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: OptionalOperation) -> GatewayError {
        GatewayError::unsupported(self.name(), operation.as_str())
    }
}

/// Type alias for a shared provider (dynamic dispatch)
pub type BoxedGatewayProvider = Arc<dyn GatewayProvider>;
