//! In-memory collaborators for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gateway_core::{
    BoxedGatewayProvider, ChargeRequest, ChargeResult, ConfigBuilder, DonationEntry,
    DonationStatus, EventLogEntry, FeatureFlags, Gateway, GatewayConfig, GatewayError,
    GatewayProvider, GatewayRepository, GatewayResult, GatewayService, GivingLedger,
    OptionalOperation, ProviderEvent, ProviderFactory, ProviderKind, ProviderRegistry,
    SecretDecryptor, SubscriptionRequest, SubscriptionResult, WebhookEndpoint, WebhookHeaders,
    WebhookResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Repository serving a fixed list of gateways
#[derive(Default)]
pub struct InMemoryRepository {
    gateways: Vec<Gateway>,
}

impl InMemoryRepository {
    pub fn new(gateways: Vec<Gateway>) -> Self {
        Self { gateways }
    }
}

#[async_trait]
impl GatewayRepository for InMemoryRepository {
    async fn load_all(&self, church_id: &str) -> GatewayResult<Vec<Gateway>> {
        Ok(self
            .gateways
            .iter()
            .filter(|g| g.church_id == church_id)
            .cloned()
            .collect())
    }
}

/// Accepts "enc:<plaintext>", rejects everything else
pub struct PrefixDecryptor;

impl SecretDecryptor for PrefixDecryptor {
    fn decrypt(&self, ciphertext: &str) -> GatewayResult<String> {
        ciphertext
            .strip_prefix("enc:")
            .map(String::from)
            .ok_or_else(|| GatewayError::Decryption("bad ciphertext".to_string()))
    }
}

/// Ledger keeping everything in memory
#[derive(Default)]
pub struct MemoryLedger {
    pub events: Mutex<Vec<EventLogEntry>>,
    pub donations: Mutex<Vec<DonationEntry>>,
    pub statuses: Mutex<Vec<(String, DonationStatus)>>,
}

#[async_trait]
impl GivingLedger for MemoryLedger {
    async fn record_event(&self, entry: EventLogEntry) -> GatewayResult<()> {
        self.events.lock().unwrap().push(entry);
        Ok(())
    }

    async fn record_donation(&self, entry: DonationEntry) -> GatewayResult<String> {
        let mut donations = self.donations.lock().unwrap();
        donations.push(entry);
        Ok(format!("don_{}", donations.len()))
    }

    async fn set_donation_status(
        &self,
        _church_id: &str,
        transaction_id: &str,
        status: DonationStatus,
    ) -> GatewayResult<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), status));
        Ok(())
    }
}

/// Provider that records the configs it was called with
pub struct RecordingProvider {
    name: String,
    operations: &'static [OptionalOperation],
    pub seen_configs: Mutex<Vec<GatewayConfig>>,
    pub seen_currencies: Mutex<Vec<String>>,
}

impl RecordingProvider {
    pub fn new(name: &str, operations: &'static [OptionalOperation]) -> Self {
        Self {
            name: name.to_string(),
            operations,
            seen_configs: Mutex::new(Vec::new()),
            seen_currencies: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, config: &GatewayConfig) {
        self.seen_configs.lock().unwrap().push(config.clone());
    }
}

#[async_trait]
impl GatewayProvider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_operations(&self) -> &'static [OptionalOperation] {
        self.operations
    }

    async fn create_webhook_endpoint(
        &self,
        config: &GatewayConfig,
        webhook_url: &str,
    ) -> GatewayResult<WebhookEndpoint> {
        self.record(config);
        Ok(WebhookEndpoint {
            id: format!("{}:{}", self.name, webhook_url),
            secret: Some("whsec_new".to_string()),
        })
    }

    async fn delete_webhooks_by_church_id(
        &self,
        config: &GatewayConfig,
        _church_id: &str,
    ) -> GatewayResult<()> {
        self.record(config);
        Ok(())
    }

    async fn verify_webhook_signature(
        &self,
        config: &GatewayConfig,
        _headers: &WebhookHeaders,
        _body: &[u8],
    ) -> GatewayResult<WebhookResult> {
        self.record(config);
        Ok(WebhookResult::ignored())
    }

    async fn process_charge(
        &self,
        config: &GatewayConfig,
        charge: &ChargeRequest,
    ) -> GatewayResult<ChargeResult> {
        self.record(config);
        if charge.amount <= 0 {
            return Err(GatewayError::provider(&self.name, "amount must be positive"));
        }
        Ok(ChargeResult {
            success: true,
            transaction_id: format!("{}_tx", self.name),
            data: serde_json::json!({ "amount": charge.amount }),
        })
    }

    async fn create_subscription(
        &self,
        config: &GatewayConfig,
        _subscription: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResult> {
        self.record(config);
        Ok(SubscriptionResult {
            success: true,
            subscription_id: "sub_1".to_string(),
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
        config: &GatewayConfig,
        _subscription_id: &str,
        _reason: Option<&str>,
    ) -> GatewayResult<()> {
        self.record(config);
        Ok(())
    }

    async fn calculate_fees(
        &self,
        amount: i64,
        _church_id: &str,
        currency: &str,
    ) -> GatewayResult<i64> {
        self.seen_currencies.lock().unwrap().push(currency.to_string());
        Ok(amount * 3 / 100)
    }

    async fn log_event(
        &self,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
    ) -> GatewayResult<()> {
        ledger
            .record_event(EventLogEntry {
                church_id: church_id.to_string(),
                provider: self.name.clone(),
                event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                customer_id: None,
                message: None,
                created_at: event.created_at,
            })
            .await
    }

    async fn log_donation(
        &self,
        config: &GatewayConfig,
        church_id: &str,
        event: &ProviderEvent,
        ledger: &dyn GivingLedger,
        status: DonationStatus,
    ) -> GatewayResult<Option<String>> {
        self.record(config);
        let id = ledger
            .record_donation(DonationEntry {
                church_id: church_id.to_string(),
                provider: self.name.clone(),
                transaction_id: event.id.clone(),
                amount: 1000,
                currency: "usd".to_string(),
                method: "card".to_string(),
                customer_id: None,
                notes: None,
                status,
                donated_at: event.created_at,
            })
            .await?;
        Ok(Some(id))
    }

    async fn create_customer(
        &self,
        config: &GatewayConfig,
        email: &str,
        _name: &str,
    ) -> GatewayResult<String> {
        self.record(config);
        Ok(format!("cus_{}", email))
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

/// Factory handing out shared [`RecordingProvider`]s
pub struct RecordingFactory {
    providers: HashMap<String, Arc<RecordingProvider>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "stripe".to_string(),
            Arc::new(RecordingProvider::new(
                "stripe",
                &[
                    OptionalOperation::CreateCustomer,
                    OptionalOperation::UpdateDonationStatus,
                ],
            )),
        );
        providers.insert(
            "paypal".to_string(),
            Arc::new(RecordingProvider::new("paypal", &[])),
        );
        providers.insert(
            "kingdomfunding".to_string(),
            // Declares more than its catalog entry allows
            Arc::new(RecordingProvider::new(
                "kingdomfunding",
                &[OptionalOperation::CreateCustomer],
            )),
        );
        Self { providers }
    }

    pub fn provider(&self, name: &str) -> Arc<RecordingProvider> {
        self.providers[name].clone()
    }
}

impl ProviderFactory for RecordingFactory {
    fn create(&self, kind: &ProviderKind) -> Option<BoxedGatewayProvider> {
        self.providers
            .get(kind.as_str())
            .map(|p| p.clone() as BoxedGatewayProvider)
    }
}

pub struct Harness {
    pub service: GatewayService,
    pub factory: Arc<RecordingFactory>,
}

/// Service over `gateways` with stripe, paypal and kingdomfunding registered
pub fn harness(gateways: Vec<Gateway>) -> Harness {
    let factory = Arc::new(RecordingFactory::new());
    let registry = ProviderRegistry::new(
        factory.clone(),
        FeatureFlags {
            enable_kingdomfunding: true,
            ..FeatureFlags::default()
        },
    )
    .unwrap();
    let config_builder =
        ConfigBuilder::new(Arc::new(PrefixDecryptor)).with_kingdomfunding_private_key("kf_key");
    let service = GatewayService::new(
        Arc::new(registry),
        config_builder,
        Arc::new(InMemoryRepository::new(gateways)),
    );
    Harness { service, factory }
}
