//! # Stripe Provider
//!
//! [`GatewayProvider`] implementation over the Stripe REST API.
//!
//! - Charges are confirmed PaymentIntents.
//! - Recurring donations are Subscriptions priced inline against the
//!   gateway's product, or against an explicit price when a plan id is given.
//! - Webhook endpoints are tagged with `metadata[church_id]` so a tenant's
//!   endpoints can be found again for deletion.

mod client;
pub mod webhook;

pub use client::{StripeClient, API_VERSION, DEFAULT_API_BASE};

use crate::amount::percentage_fee;
use async_trait::async_trait;
use chrono::Utc;
use client::{object_id, str_field, Form};
use gateway_core::settings::CaptureMethod;
use gateway_core::settings::SetupFutureUsage;
use gateway_core::{
    BankAccountUpdate, CardUpdate, ChargeRequest, ChargeResult, DonationEntry, DonationStatus,
    EventLogEntry, GatewayConfig, GatewayError, GatewayProvider, GatewayResult, GivingLedger,
    OptionalOperation, ProviderEvent, SubscriptionRequest, SubscriptionResult, WebhookEndpoint,
    WebhookHeaders, WebhookResult,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Card pricing: 2.9% + 30 minor units
const FEE_BASIS_POINTS: i64 = 290;
const FEE_FIXED: i64 = 30;

const SUPPORTED: &[OptionalOperation] = &[
    OptionalOperation::CreateProduct,
    OptionalOperation::CreateCustomer,
    OptionalOperation::GetCustomerSubscriptions,
    OptionalOperation::GetCustomerPaymentMethods,
    OptionalOperation::AttachPaymentMethod,
    OptionalOperation::DetachPaymentMethod,
    OptionalOperation::UpdateCard,
    OptionalOperation::CreateBankAccount,
    OptionalOperation::UpdateBank,
    OptionalOperation::VerifyBank,
    OptionalOperation::DeleteBankAccount,
    OptionalOperation::CreateSetupIntent,
    OptionalOperation::CreateAchSetupIntent,
    OptionalOperation::ConfirmSetupIntent,
    OptionalOperation::GetCharge,
    OptionalOperation::UpdateDonationStatus,
];

pub struct StripeProvider {
    client: StripeClient,
}

impl StripeProvider {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }

    fn charge_form(config: &GatewayConfig, charge: &ChargeRequest) -> Form {
        let mut form: Form = vec![
            ("amount".to_string(), charge.amount.to_string()),
            ("currency".to_string(), charge.currency.to_lowercase()),
            ("confirm".to_string(), "true".to_string()),
            ("metadata[church_id]".to_string(), config.church_id.clone()),
        ];

        if let Some(customer) = &charge.customer_id {
            form.push(("customer".to_string(), customer.clone()));
        }
        if let Some(method) = &charge.payment_method_id {
            form.push(("payment_method".to_string(), method.clone()));
        }
        if let Some(description) = &charge.description {
            form.push(("description".to_string(), description.clone()));
        }

        match config.settings.as_ref().and_then(|s| s.as_stripe()) {
            Some(settings) => {
                if let Some(descriptor) = &settings.statement_descriptor {
                    form.push(("statement_descriptor_suffix".to_string(), descriptor.clone()));
                }
                match &settings.payment_method_types {
                    Some(types) => {
                        for kind in types {
                            form.push(("payment_method_types[]".to_string(), kind.clone()));
                        }
                    }
                    None => push_automatic_methods(&mut form),
                }
                if let Some(method) = settings.capture_method {
                    let value = match method {
                        CaptureMethod::Automatic => "automatic",
                        CaptureMethod::Manual => "manual",
                    };
                    form.push(("capture_method".to_string(), value.to_string()));
                }
                if let Some(usage) = settings.setup_future_usage {
                    let value = match usage {
                        SetupFutureUsage::OnSession => "on_session",
                        SetupFutureUsage::OffSession => "off_session",
                    };
                    form.push(("setup_future_usage".to_string(), value.to_string()));
                }
                if settings.connect_account_id.is_some() {
                    if let Some(percent) = settings.application_fee_percent {
                        let fee = (charge.amount as f64 * percent / 100.0).round() as i64;
                        form.push(("application_fee_amount".to_string(), fee.to_string()));
                    }
                }
            }
            None => push_automatic_methods(&mut form),
        }

        push_metadata(&mut form, &charge.metadata);
        form
    }

    fn subscription_items(
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
        form: &mut Form,
    ) -> GatewayResult<()> {
        if let Some(price) = &subscription.plan_id {
            form.push(("items[0][price]".to_string(), price.clone()));
            return Ok(());
        }

        let product = config.product_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "Gateway {} has no product; create one before adding subscriptions",
                config.gateway_id
            ))
        })?;

        form.extend([
            ("items[0][price_data][product]".to_string(), product.clone()),
            (
                "items[0][price_data][currency]".to_string(),
                subscription.currency.to_lowercase(),
            ),
            (
                "items[0][price_data][unit_amount]".to_string(),
                subscription.amount.to_string(),
            ),
            (
                "items[0][price_data][recurring][interval]".to_string(),
                subscription.interval.as_str().to_string(),
            ),
            (
                "items[0][price_data][recurring][interval_count]".to_string(),
                subscription.interval_count.to_string(),
            ),
        ]);
        Ok(())
    }

    fn subscription_result(response: Value) -> GatewayResult<SubscriptionResult> {
        let status = str_field(&response, "status").unwrap_or_default();
        Ok(SubscriptionResult {
            success: matches!(status, "active" | "trialing" | "incomplete"),
            subscription_id: object_id(&response)?,
            data: response,
        })
    }
}

fn push_automatic_methods(form: &mut Form) {
    form.push((
        "automatic_payment_methods[enabled]".to_string(),
        "true".to_string(),
    ));
    form.push((
        "automatic_payment_methods[allow_redirects]".to_string(),
        "never".to_string(),
    ));
}

fn push_metadata(form: &mut Form, metadata: &HashMap<String, String>) {
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();
    for key in keys {
        form.push((format!("metadata[{}]", key), metadata[key].clone()));
    }
}

/// Donation method reported by a charge or payment intent object
fn payment_method_kind(object: &Value) -> &'static str {
    let detail = object
        .pointer("/payment_method_details/type")
        .and_then(Value::as_str)
        .or_else(|| {
            object
                .pointer("/payment_method_types/0")
                .and_then(Value::as_str)
        });
    match detail {
        Some("us_bank_account") | Some("ach_debit") | Some("ach_credit_transfer") => "ach",
        _ => "card",
    }
}

#[async_trait]
impl GatewayProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    fn supported_operations(&self) -> &'static [OptionalOperation] {
        SUPPORTED
    }

    #[instrument(skip(self, config), fields(gateway_id = %config.gateway_id))]
    async fn create_webhook_endpoint(
        &self,
        config: &GatewayConfig,
        webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint> {
        let mut form: Form = vec![
            ("url".to_string(), webhook_url.to_string()),
            ("metadata[church_id]".to_string(), config.church_id.clone()),
        ];
        for event in webhook::WEBHOOK_EVENTS {
            form.push(("enabled_events[]".to_string(), event.to_string()));
        }

        let response = self.client.post(config, "/v1/webhook_endpoints", &form, None).await?;
        let id = object_id(&response)?;
        info!(webhook_id = %id, "Created Stripe webhook endpoint");

        Ok(WebhookEndpoint {
            id,
            secret: str_field(&response, "secret").map(String::from),
        })
    }

    #[instrument(skip(self, config), fields(gateway_id = %config.gateway_id))]
    async fn delete_webhooks_by_church_id(
        &self,
        config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<()> {
        let query: Form = vec![("limit".to_string(), "100".to_string())];
        let response = self.client.get(config, "/v1/webhook_endpoints", &query).await?;

        let endpoints = response
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for endpoint in endpoints {
            let owned = endpoint
                .pointer("/metadata/church_id")
                .and_then(Value::as_str)
                == Some(church_id);
            if !owned {
                continue;
            }
            let id = object_id(&endpoint)?;
            self.client
                .delete(config, &format!("/v1/webhook_endpoints/{}", id), &Vec::new())
                .await?;
            info!(webhook_id = %id, "Deleted Stripe webhook endpoint");
        }
        Ok(())
    }

    #[instrument(skip(self, config, headers, body), fields(gateway_id = %config.gateway_id))]
    async fn verify_webhook_signature(
        &self,
        config: &GatewayConfig,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> GatewayResult<WebhookResult> {
        let Some(signature) = headers.get("stripe-signature") else {
            warn!("Stripe webhook without signature header");
            return Ok(WebhookResult::rejected());
        };
        if config.webhook_key.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "Stripe webhook secret is not configured for gateway {}",
                config.gateway_id
            )));
        }

        if let Err(e) = webhook::verify_signature(&config.webhook_key, signature, body, Utc::now().timestamp()) {
            warn!(error = %e, "Rejected Stripe webhook");
            return Ok(WebhookResult::rejected());
        }

        let event = webhook::parse_event(body)?;
        debug!(event_type = %event.event_type, "Verified Stripe webhook");

        Ok(WebhookResult {
            success: true,
            should_process: webhook::should_process(&event.event_type),
            event: Some(event),
        })
    }

    #[instrument(skip(self, config, charge), fields(gateway_id = %config.gateway_id, amount = charge.amount))]
    async fn process_charge(
        &self,
        config: &GatewayConfig,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        if charge.amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "Charge amount must be positive".to_string(),
            ));
        }

        let form = Self::charge_form(config, charge);
        let idempotency_key = charge
            .idempotency_key
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let response = self
            .client
            .post(config, "/v1/payment_intents", &form, Some(&idempotency_key))
            .await?;

        let status = str_field(&response, "status").unwrap_or_default();
        let transaction_id = object_id(&response)?;
        info!(transaction_id = %transaction_id, status = %status, "Stripe payment intent created");

        Ok(ChargeResult {
            success: matches!(status, "succeeded" | "processing" | "requires_capture"),
            transaction_id,
            data: response,
        })
    }

    #[instrument(skip(self, config, subscription), fields(gateway_id = %config.gateway_id))]
    async fn create_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let customer = subscription.customer_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest("Stripe subscriptions require a customer".to_string())
        })?;

        let mut form: Form = vec![
            ("customer".to_string(), customer.clone()),
            ("metadata[church_id]".to_string(), config.church_id.clone()),
        ];
        Self::subscription_items(config, subscription, &mut form)?;
        if let Some(method) = &subscription.payment_method_id {
            form.push(("default_payment_method".to_string(), method.clone()));
        }
        push_metadata(&mut form, &subscription.metadata);

        let idempotency_key = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(config, "/v1/subscriptions", &form, Some(&idempotency_key))
            .await?;
        Self::subscription_result(response)
    }

    #[instrument(skip(self, config, subscription), fields(gateway_id = %config.gateway_id))]
    async fn update_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let id = subscription.subscription_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest("Subscription id is required for updates".to_string())
        })?;
        let path = format!("/v1/subscriptions/{}", id);

        let current = self.client.get(config, &path, &Vec::new()).await?;
        let item_id = current
            .pointer("/items/data/0/id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::provider("stripe", format!("Subscription {} has no items", id)))?;

        let mut form: Form = vec![
            ("items[0][id]".to_string(), item_id.to_string()),
            ("proration_behavior".to_string(), "none".to_string()),
        ];
        Self::subscription_items(config, subscription, &mut form)?;
        if let Some(method) = &subscription.payment_method_id {
            form.push(("default_payment_method".to_string(), method.clone()));
        }
        push_metadata(&mut form, &subscription.metadata);

        let response = self.client.post(config, &path, &form, None).await?;
        Self::subscription_result(response)
    }

    #[instrument(skip(self, config), fields(gateway_id = %config.gateway_id))]
    async fn cancel_subscription(
        &self,
        config: &GatewayConfig,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> GatewayResult<()> {
        let mut form = Form::new();
        if let Some(reason) = reason {
            form.push(("cancellation_details[comment]".to_string(), reason.to_string()));
        }
        self.client
            .delete(config, &format!("/v1/subscriptions/{}", subscription_id), &form)
            .await?;
        info!(subscription_id = %subscription_id, "Cancelled Stripe subscription");
        Ok(())
    }

    async fn calculate_fees(
        &self,
        amount: i64,
        _church_id: &str,
        _currency: &str,
    ) -> GatewayResult<i64> {
        if amount <= 0 {
            return Ok(0);
        }
        Ok(percentage_fee(amount, FEE_BASIS_POINTS, FEE_FIXED)?)
    }

    async fn log_event(
        &self,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        let message = event
            .data
            .pointer("/outcome/seller_message")
            .or_else(|| event.data.pointer("/failure_message"))
            .and_then(Value::as_str)
            .map(String::from);

        ledger
            .record_event(EventLogEntry {
                church_id: church_id.to_string(),
                provider: self.name().to_string(),
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                customer_id: str_field(&event.data, "customer").map(String::from),
                message,
                created_at: event.created_at,
            })
            .await
    }

    async fn log_donation(
        &self,
        _config: &GatewayConfig,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
        status: DonationStatus,
    ) -> GatewayResult<Option<String>> {
        let object = &event.data;
        let amount = ["amount_received", "amount_paid", "amount"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_i64))
            .unwrap_or(0);

        if amount <= 0 {
            debug!(event_id = %event.id, "Stripe event carries no donation amount");
            return Ok(None);
        }

        let transaction_id = object_id(object)?;
        let id = ledger
            .record_donation(DonationEntry {
                church_id: church_id.to_string(),
                provider: self.name().to_string(),
                transaction_id,
                amount,
                currency: str_field(object, "currency").unwrap_or("usd").to_string(),
                method: payment_method_kind(object).to_string(),
                customer_id: str_field(object, "customer").map(String::from),
                notes: str_field(object, "description").map(String::from),
                status,
                donated_at: event.created_at,
            })
            .await?;
        Ok(Some(id))
    }

    async fn create_product(
        &self,
        config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<Option<String>> {
        let form: Form = vec![
            ("name".to_string(), format!("Donations {}", church_id)),
            ("metadata[church_id]".to_string(), church_id.to_string()),
        ];
        let response = self.client.post(config, "/v1/products", &form, None).await?;
        Ok(Some(object_id(&response)?))
    }

    async fn create_customer(
        &self,
        config: &GatewayConfig,
        email: &str,
        name: &str,
    ) -> GatewayResult<String> {
        let form: Form = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
            ("metadata[church_id]".to_string(), config.church_id.clone()),
        ];
        let response = self.client.post(config, "/v1/customers", &form, None).await?;
        object_id(&response)
    }

    async fn get_customer_subscriptions(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let query: Form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("status".to_string(), "all".to_string()),
        ];
        let response = self.client.get(config, "/v1/subscriptions", &query).await?;
        Ok(response.get("data").cloned().unwrap_or(Value::Array(Vec::new())))
    }

    async fn get_customer_payment_methods(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let path = format!("/v1/customers/{}/payment_methods", customer_id);
        let response = self.client.get(config, &path, &Vec::new()).await?;
        Ok(response.get("data").cloned().unwrap_or(Value::Array(Vec::new())))
    }

    async fn attach_payment_method(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let form: Form = vec![("customer".to_string(), customer_id.to_string())];
        let path = format!("/v1/payment_methods/{}/attach", payment_method_id);
        self.client.post(config, &path, &form, None).await
    }

    async fn detach_payment_method(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
    ) -> GatewayResult<Value> {
        let path = format!("/v1/payment_methods/{}/detach", payment_method_id);
        self.client.post(config, &path, &Vec::new(), None).await
    }

    async fn update_card(
        &self,
        config: &GatewayConfig,
        payment_method_id: &str,
        card: &CardUpdate,
    ) -> GatewayResult<Value> {
        let mut form = Form::new();
        if let Some(month) = card.exp_month {
            form.push(("card[exp_month]".to_string(), month.to_string()));
        }
        if let Some(year) = card.exp_year {
            form.push(("card[exp_year]".to_string(), year.to_string()));
        }
        if let Some(name) = &card.name {
            form.push(("billing_details[name]".to_string(), name.clone()));
        }
        if let Some(postal_code) = &card.postal_code {
            form.push((
                "billing_details[address][postal_code]".to_string(),
                postal_code.clone(),
            ));
        }
        let path = format!("/v1/payment_methods/{}", payment_method_id);
        self.client.post(config, &path, &form, None).await
    }

    async fn create_bank_account(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
        source_token: &str,
    ) -> GatewayResult<Value> {
        let form: Form = vec![("source".to_string(), source_token.to_string())];
        let path = format!("/v1/customers/{}/sources", customer_id);
        self.client.post(config, &path, &form, None).await
    }

    async fn update_bank(
        &self,
        config: &GatewayConfig,
        bank_account_id: &str,
        bank: &BankAccountUpdate,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let mut form = Form::new();
        if let Some(name) = &bank.account_holder_name {
            form.push(("account_holder_name".to_string(), name.clone()));
        }
        if let Some(kind) = &bank.account_holder_type {
            form.push(("account_holder_type".to_string(), kind.clone()));
        }
        let path = format!("/v1/customers/{}/sources/{}", customer_id, bank_account_id);
        self.client.post(config, &path, &form, None).await
    }

    async fn verify_bank(
        &self,
        config: &GatewayConfig,
        bank_account_id: &str,
        amounts: &[i64],
        customer_id: &str,
    ) -> GatewayResult<Value> {
        if amounts.len() != 2 {
            return Err(GatewayError::InvalidRequest(
                "Bank verification needs exactly two micro-deposit amounts".to_string(),
            ));
        }
        let form: Form = amounts
            .iter()
            .map(|amount| ("amounts[]".to_string(), amount.to_string()))
            .collect();
        let path = format!(
            "/v1/customers/{}/sources/{}/verify",
            customer_id, bank_account_id
        );
        self.client.post(config, &path, &form, None).await
    }

    async fn delete_bank_account(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
        bank_account_id: &str,
    ) -> GatewayResult<Value> {
        let path = format!("/v1/customers/{}/sources/{}", customer_id, bank_account_id);
        self.client.delete(config, &path, &Vec::new()).await
    }

    async fn create_setup_intent(
        &self,
        config: &GatewayConfig,
        customer_id: Option<&str>,
    ) -> GatewayResult<Value> {
        let mut form: Form = vec![("usage".to_string(), "off_session".to_string())];
        if let Some(customer) = customer_id {
            form.push(("customer".to_string(), customer.to_string()));
        }
        self.client.post(config, "/v1/setup_intents", &form, None).await
    }

    async fn create_ach_setup_intent(
        &self,
        config: &GatewayConfig,
        customer_id: &str,
    ) -> GatewayResult<Value> {
        let form: Form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("usage".to_string(), "off_session".to_string()),
            ("payment_method_types[]".to_string(), "us_bank_account".to_string()),
            (
                "payment_method_options[us_bank_account][verification_method]".to_string(),
                "automatic".to_string(),
            ),
        ];
        self.client.post(config, "/v1/setup_intents", &form, None).await
    }

    async fn confirm_setup_intent(
        &self,
        config: &GatewayConfig,
        setup_intent_id: &str,
        payment_method_id: &str,
    ) -> GatewayResult<Value> {
        let form: Form = vec![("payment_method".to_string(), payment_method_id.to_string())];
        let path = format!("/v1/setup_intents/{}/confirm", setup_intent_id);
        self.client.post(config, &path, &form, None).await
    }

    async fn get_charge(&self, config: &GatewayConfig, charge_id: &str) -> GatewayResult<Value> {
        let path = format!("/v1/charges/{}", charge_id);
        self.client.get(config, &path, &Vec::new()).await
    }

    async fn update_donation_status(
        &self,
        church_id: &str,
        transaction_id: &str,
        status: DonationStatus,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        ledger
            .set_donation_status(church_id, transaction_id, status)
            .await
    }
}
