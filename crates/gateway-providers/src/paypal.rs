//! # PayPal Provider
//!
//! [`GatewayProvider`] implementation over the PayPal REST API (JSON).
//!
//! Every call first exchanges the gateway's client id (`public_key`) and
//! secret (`private_key`) for an OAuth2 access token; tokens are not cached
//! across calls.
//!
//! ```text
//! process_charge ─► POST /v2/checkout/orders/{order}/capture
//! subscriptions  ─► /v1/billing/subscriptions (plan based)
//! webhooks       ─► /v1/notifications/webhooks + verify-webhook-signature
//! ```

use crate::amount::{from_decimal, percentage_fee, to_decimal};
use async_trait::async_trait;
use chrono::Utc;
use gateway_core::settings::{LandingPage, ShippingPreference, UserAction};
use gateway_core::{
    ChargeRequest, ChargeResult, DonationEntry, DonationStatus, EventLogEntry, GatewayConfig,
    GatewayError, GatewayProvider, GatewayResult, GivingLedger, Interval, OptionalOperation,
    OrderRequest, PlanRequest, ProviderEvent, SubscriptionRequest, SubscriptionResult,
    WebhookEndpoint, WebhookHeaders, WebhookResult,
};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://api-m.paypal.com";
pub const SANDBOX_API_BASE: &str = "https://api-m.sandbox.paypal.com";

/// Standard checkout pricing: 3.49% + 49 minor units
const FEE_BASIS_POINTS: i64 = 349;
const FEE_FIXED: i64 = 49;

const WEBHOOK_EVENTS: &[&str] = &[
    "PAYMENT.CAPTURE.COMPLETED",
    "PAYMENT.CAPTURE.DENIED",
    "PAYMENT.CAPTURE.REFUNDED",
    "PAYMENT.SALE.COMPLETED",
    "BILLING.SUBSCRIPTION.ACTIVATED",
    "BILLING.SUBSCRIPTION.CANCELLED",
    "BILLING.SUBSCRIPTION.SUSPENDED",
];

const PROCESSABLE_EVENTS: &[&str] = &[
    "PAYMENT.CAPTURE.COMPLETED",
    "PAYMENT.CAPTURE.DENIED",
    "PAYMENT.CAPTURE.REFUNDED",
    "PAYMENT.SALE.COMPLETED",
    "BILLING.SUBSCRIPTION.CANCELLED",
];

const SUPPORTED: &[OptionalOperation] = &[
    OptionalOperation::CreateProduct,
    OptionalOperation::GenerateClientToken,
    OptionalOperation::CreateOrder,
    OptionalOperation::CreateSubscriptionPlan,
    OptionalOperation::CreateSubscriptionWithPlan,
    OptionalOperation::GetCharge,
    OptionalOperation::UpdateDonationStatus,
];

pub struct PayPalProvider {
    http: Client,
    api_base_url: String,
}

impl PayPalProvider {
    pub fn new(http: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn access_token(&self, config: &GatewayConfig) -> GatewayResult<String> {
        if config.public_key.is_empty() || config.private_key.is_empty() {
            return Err(GatewayError::Configuration(format!(
                "PayPal client credentials are not configured for gateway {}",
                config.gateway_id
            )));
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base_url))
            .basic_auth(&config.public_key, Some(&config.private_key))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let token: TokenResponse = read_json(response, "/v1/oauth2/token").await?;
        Ok(token.access_token)
    }

    async fn send(
        &self,
        config: &GatewayConfig,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<Value> {
        let token = self.access_token(config).await?;
        debug!(method = %method, path = %path, "PayPal request");

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.api_base_url, path))
            .bearer_auth(token);

        if method == Method::POST {
            request = request.header("PayPal-Request-Id", uuid::Uuid::new_v4().to_string());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        read_json(response, path).await
    }

    fn application_context(config: &GatewayConfig) -> Option<Value> {
        let settings = config.settings.as_ref()?.as_paypal()?;
        let mut context = serde_json::Map::new();

        if let Some(brand) = &settings.brand_name {
            context.insert("brand_name".to_string(), json!(brand));
        }
        if let Some(page) = settings.landing_page {
            let page = match page {
                LandingPage::Login => "LOGIN",
                LandingPage::Billing => "BILLING",
                LandingPage::NoPreference => "NO_PREFERENCE",
            };
            context.insert("landing_page".to_string(), json!(page));
        }
        if let Some(action) = settings.user_action {
            let action = match action {
                UserAction::Continue => "CONTINUE",
                UserAction::PayNow => "PAY_NOW",
            };
            context.insert("user_action".to_string(), json!(action));
        }
        if let Some(shipping) = settings.shipping_preference {
            let shipping = match shipping {
                ShippingPreference::GetFromFile => "GET_FROM_FILE",
                ShippingPreference::NoShipping => "NO_SHIPPING",
                ShippingPreference::SetProvidedAddress => "SET_PROVIDED_ADDRESS",
            };
            context.insert("shipping_preference".to_string(), json!(shipping));
        }
        if let Some(url) = &settings.return_url {
            context.insert("return_url".to_string(), json!(url));
        }
        if let Some(url) = &settings.cancel_url {
            context.insert("cancel_url".to_string(), json!(url));
        }

        (!context.is_empty()).then_some(Value::Object(context))
    }

    fn subscription_result(response: Value) -> GatewayResult<SubscriptionResult> {
        let subscription_id = response
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| GatewayError::Serialization("PayPal subscription has no id".to_string()))?;
        let status = response.get("status").and_then(Value::as_str).unwrap_or_default();

        Ok(SubscriptionResult {
            success: matches!(status, "APPROVAL_PENDING" | "APPROVED" | "ACTIVE"),
            subscription_id,
            data: response,
        })
    }
}

fn interval_unit(interval: Interval) -> &'static str {
    match interval {
        Interval::Day => "DAY",
        Interval::Week => "WEEK",
        Interval::Month => "MONTH",
        Interval::Year => "YEAR",
    }
}

/// PayPal amount object `{ currency_code, value }` in minor units
fn money_minor(amount: &Value) -> GatewayResult<(i64, String)> {
    let currency = amount
        .get("currency_code")
        .and_then(Value::as_str)
        .unwrap_or("USD")
        .to_lowercase();
    let value = amount
        .get("value")
        .or_else(|| amount.get("total"))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Serialization("PayPal amount has no value".to_string()))?;
    Ok((from_decimal(value, &currency)?, currency))
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> GatewayResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Network(e.to_string()))?;

    if !status.is_success() {
        error!(status = %status, path = %path, "PayPal API error");

        if let Ok(error_response) = serde_json::from_str::<PayPalErrorResponse>(&body) {
            return Err(GatewayError::provider("paypal", error_response.describe()));
        }
        return Err(GatewayError::provider(
            "paypal",
            format!("HTTP {}: {}", status, body),
        ));
    }

    // 204 responses carry no body
    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(|e| {
        GatewayError::Serialization(format!("Failed to parse PayPal response: {}", e))
    })
}

#[async_trait]
impl GatewayProvider for PayPalProvider {
    fn name(&self) -> &str {
        "paypal"
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
        let event_types: Vec<Value> = WEBHOOK_EVENTS
            .iter()
            .map(|name| json!({ "name": name }))
            .collect();
        let body = json!({ "url": webhook_url, "event_types": event_types });

        let response = self
            .send(config, Method::POST, "/v1/notifications/webhooks", Some(&body))
            .await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| GatewayError::Serialization("PayPal webhook has no id".to_string()))?;
        info!(webhook_id = %id, "Created PayPal webhook");

        Ok(WebhookEndpoint { id, secret: None })
    }

    /// PayPal webhooks carry no metadata; a tenant's webhooks are the ones
    /// whose URL mentions its church id.
    #[instrument(skip(self, config), fields(gateway_id = %config.gateway_id))]
    async fn delete_webhooks_by_church_id(
        &self,
        config: &GatewayConfig,
        church_id: &str,
    ) -> GatewayResult<()> {
        let response = self
            .send(config, Method::GET, "/v1/notifications/webhooks", None)
            .await?;
        let webhooks = response
            .get("webhooks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for webhook in webhooks {
            let url = webhook.get("url").and_then(Value::as_str).unwrap_or_default();
            let Some(id) = webhook.get("id").and_then(Value::as_str) else {
                continue;
            };
            if !url.contains(church_id) {
                continue;
            }
            self.send(
                config,
                Method::DELETE,
                &format!("/v1/notifications/webhooks/{}", id),
                None,
            )
            .await?;
            info!(webhook_id = %id, "Deleted PayPal webhook");
        }
        Ok(())
    }

    /// `config.webhook_key` holds the PayPal webhook id the event was sent to.
    #[instrument(skip(self, config, headers, body), fields(gateway_id = %config.gateway_id))]
    async fn verify_webhook_signature(
        &self,
        config: &GatewayConfig,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> GatewayResult<WebhookResult> {
        let header = |name: &str| headers.get(name).cloned();
        let (Some(auth_algo), Some(cert_url), Some(transmission_id), Some(transmission_sig), Some(transmission_time)) = (
            header("paypal-auth-algo"),
            header("paypal-cert-url"),
            header("paypal-transmission-id"),
            header("paypal-transmission-sig"),
            header("paypal-transmission-time"),
        ) else {
            warn!("PayPal webhook missing transmission headers");
            return Ok(WebhookResult::rejected());
        };

        let webhook_event: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::Serialization(format!("Failed to parse webhook: {}", e)))?;

        let verification = json!({
            "auth_algo": auth_algo,
            "cert_url": cert_url,
            "transmission_id": transmission_id,
            "transmission_sig": transmission_sig,
            "transmission_time": transmission_time,
            "webhook_id": config.webhook_key,
            "webhook_event": webhook_event,
        });
        let response = self
            .send(
                config,
                Method::POST,
                "/v1/notifications/verify-webhook-signature",
                Some(&verification),
            )
            .await?;

        if response.get("verification_status").and_then(Value::as_str) != Some("SUCCESS") {
            warn!("PayPal rejected webhook signature");
            return Ok(WebhookResult::rejected());
        }

        let event_type = webhook_event
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let created_at = webhook_event
            .get("create_time")
            .and_then(Value::as_str)
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let event = ProviderEvent {
            id: webhook_event
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            event_type: event_type.clone(),
            data: webhook_event.get("resource").cloned().unwrap_or(Value::Null),
            created_at,
        };

        Ok(WebhookResult {
            success: true,
            should_process: PROCESSABLE_EVENTS.contains(&event_type.as_str()),
            event: Some(event),
        })
    }

    #[instrument(skip(self, config, charge), fields(gateway_id = %config.gateway_id, amount = charge.amount))]
    async fn process_charge(
        &self,
        config: &GatewayConfig,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        let order_id = charge.order_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest("PayPal charges capture an approved order; orderId is required".to_string())
        })?;

        let response = self
            .send(
                config,
                Method::POST,
                &format!("/v2/checkout/orders/{}/capture", order_id),
                Some(&json!({})),
            )
            .await?;

        let capture = response.pointer("/purchase_units/0/payments/captures/0");
        let transaction_id = capture
            .and_then(|c| c.get("id"))
            .and_then(Value::as_str)
            .unwrap_or(order_id)
            .to_string();
        let status = response.get("status").and_then(Value::as_str).unwrap_or_default();
        info!(transaction_id = %transaction_id, status = %status, "Captured PayPal order");

        Ok(ChargeResult {
            success: status == "COMPLETED",
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
        let plan_id = subscription.plan_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest("PayPal subscriptions require a planId".to_string())
        })?;

        let mut body = json!({
            "plan_id": plan_id,
            "custom_id": config.church_id,
        });
        if let Some(context) = Self::application_context(config) {
            body["application_context"] = context;
        }

        let response = self
            .send(config, Method::POST, "/v1/billing/subscriptions", Some(&body))
            .await?;
        Self::subscription_result(response)
    }

    #[instrument(skip(self, config, subscription), fields(gateway_id = %config.gateway_id))]
    async fn update_subscription(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let (Some(id), Some(plan_id)) = (&subscription.subscription_id, &subscription.plan_id) else {
            return Err(GatewayError::InvalidRequest(
                "PayPal subscription updates require subscriptionId and planId".to_string(),
            ));
        };

        let response = self
            .send(
                config,
                Method::POST,
                &format!("/v1/billing/subscriptions/{}/revise", id),
                Some(&json!({ "plan_id": plan_id })),
            )
            .await?;

        Ok(SubscriptionResult {
            success: true,
            subscription_id: id.clone(),
            data: response,
        })
    }

    #[instrument(skip(self, config), fields(gateway_id = %config.gateway_id))]
    async fn cancel_subscription(
        &self,
        config: &GatewayConfig,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> GatewayResult<()> {
        let body = json!({ "reason": reason.unwrap_or("Cancelled by donor") });
        self.send(
            config,
            Method::POST,
            &format!("/v1/billing/subscriptions/{}/cancel", subscription_id),
            Some(&body),
        )
        .await?;
        info!(subscription_id = %subscription_id, "Cancelled PayPal subscription");
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
        let customer_id = event
            .data
            .pointer("/subscriber/payer_id")
            .or_else(|| event.data.pointer("/payer/payer_id"))
            .and_then(Value::as_str)
            .map(String::from);

        ledger
            .record_event(EventLogEntry {
                church_id: church_id.to_string(),
                provider: self.name().to_string(),
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                customer_id,
                message: event
                    .data
                    .get("status")
                    .and_then(Value::as_str)
                    .map(String::from),
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
        let Some(amount) = event.data.get("amount") else {
            debug!(event_id = %event.id, "PayPal event carries no donation amount");
            return Ok(None);
        };
        let (amount, currency) = money_minor(amount)?;

        let transaction_id = event
            .data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(&event.id)
            .to_string();

        let id = ledger
            .record_donation(DonationEntry {
                church_id: church_id.to_string(),
                provider: self.name().to_string(),
                transaction_id,
                amount,
                currency,
                method: "paypal".to_string(),
                customer_id: event
                    .data
                    .get("billing_agreement_id")
                    .and_then(Value::as_str)
                    .map(String::from),
                notes: event
                    .data
                    .get("custom_id")
                    .and_then(Value::as_str)
                    .map(String::from),
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
        let body = json!({
            "name": format!("Donations {}", church_id),
            "type": "SERVICE",
            "category": "CHARITY",
        });
        let response = self
            .send(config, Method::POST, "/v1/catalogs/products", Some(&body))
            .await?;
        Ok(response.get("id").and_then(Value::as_str).map(String::from))
    }

    async fn generate_client_token(&self, config: &GatewayConfig) -> GatewayResult<String> {
        let response = self
            .send(config, Method::POST, "/v1/identity/generate-token", Some(&json!({})))
            .await?;
        response
            .get("client_token")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| GatewayError::Serialization("PayPal returned no client token".to_string()))
    }

    async fn create_order(&self, config: &GatewayConfig, order: &OrderRequest) -> GatewayResult<Value> {
        let mut unit = json!({
            "amount": {
                "currency_code": order.currency.to_uppercase(),
                "value": to_decimal(order.amount, &order.currency),
            },
            "custom_id": config.church_id,
        });
        if let Some(description) = &order.description {
            unit["description"] = json!(description);
        }
        if let Some(reference) = &order.reference_id {
            unit["reference_id"] = json!(reference);
        }

        let mut body = json!({ "intent": "CAPTURE", "purchase_units": [unit] });
        if let Some(context) = Self::application_context(config) {
            body["application_context"] = context;
        }
        self.send(config, Method::POST, "/v2/checkout/orders", Some(&body))
            .await
    }

    async fn create_subscription_plan(
        &self,
        config: &GatewayConfig,
        plan: &PlanRequest,
    ) -> GatewayResult<String> {
        let product_id = plan
            .product_id
            .as_ref()
            .or(config.product_id.as_ref())
            .ok_or_else(|| {
                GatewayError::InvalidRequest("PayPal plans require a product".to_string())
            })?;

        let body = json!({
            "product_id": product_id,
            "name": plan.name,
            "status": "ACTIVE",
            "billing_cycles": [{
                "frequency": {
                    "interval_unit": interval_unit(plan.interval),
                    "interval_count": plan.interval_count,
                },
                "tenure_type": "REGULAR",
                "sequence": 1,
                "total_cycles": 0,
                "pricing_scheme": {
                    "fixed_price": {
                        "value": to_decimal(plan.amount, &plan.currency),
                        "currency_code": plan.currency.to_uppercase(),
                    }
                }
            }],
            "payment_preferences": { "auto_bill_outstanding": true },
        });

        let response = self
            .send(config, Method::POST, "/v1/billing/plans", Some(&body))
            .await?;
        response
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| GatewayError::Serialization("PayPal plan has no id".to_string()))
    }

    async fn create_subscription_with_plan(
        &self,
        config: &GatewayConfig,
        subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        let plan = PlanRequest {
            name: format!(
                "Recurring gift {} {}/{}",
                to_decimal(subscription.amount, &subscription.currency),
                subscription.currency.to_uppercase(),
                subscription.interval.as_str()
            ),
            amount: subscription.amount,
            currency: subscription.currency.clone(),
            interval: subscription.interval,
            interval_count: subscription.interval_count,
            product_id: None,
        };
        let plan_id = self.create_subscription_plan(config, &plan).await?;
        debug!(plan_id = %plan_id, "Created PayPal plan for subscription");

        let with_plan = SubscriptionRequest {
            plan_id: Some(plan_id),
            ..subscription.clone()
        };
        self.create_subscription(config, &with_plan).await
    }

    async fn get_charge(&self, config: &GatewayConfig, charge_id: &str) -> GatewayResult<Value> {
        self.send(
            config,
            Method::GET,
            &format!("/v2/payments/captures/{}", charge_id),
            None,
        )
        .await
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

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl PayPalErrorResponse {
    fn describe(&self) -> String {
        match (&self.name, &self.message, &self.error_description) {
            (Some(name), Some(message), _) => format!("{}: {}", name, message),
            (_, Some(message), _) => message.clone(),
            (_, _, Some(description)) => description.clone(),
            (Some(name), None, None) => name.clone(),
            (None, None, None) => "Unknown PayPal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_minor() {
        let (amount, currency) = money_minor(&json!({ "currency_code": "USD", "value": "25.50" })).unwrap();
        assert_eq!(amount, 2550);
        assert_eq!(currency, "usd");

        let (amount, _) = money_minor(&json!({ "total": "10.00", "currency": "USD" })).unwrap();
        assert_eq!(amount, 1000);

        assert!(money_minor(&json!({ "currency_code": "USD" })).is_err());
    }

    #[test]
    fn test_error_description() {
        let err: PayPalErrorResponse =
            serde_json::from_str(r#"{"name":"INVALID_REQUEST","message":"Bad plan"}"#).unwrap();
        assert_eq!(err.describe(), "INVALID_REQUEST: Bad plan");

        let err: PayPalErrorResponse =
            serde_json::from_str(r#"{"error":"invalid_client","error_description":"Client Authentication failed"}"#).unwrap();
        assert_eq!(err.describe(), "Client Authentication failed");
    }

    #[tokio::test]
    async fn test_fees() {
        let provider = PayPalProvider::new(Client::new(), DEFAULT_API_BASE);
        assert_eq!(provider.calculate_fees(10_000, "church_1", "usd").await.unwrap(), 398);
        assert!(provider.calculate_fees(i64::MAX, "church_1", "usd").await.unwrap() > 0);
    }
}
