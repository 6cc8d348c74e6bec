#![allow(dead_code)]

use async_trait::async_trait;
use gateway_core::{
    ConfigBuilder, DonationEntry, DonationStatus, EventLogEntry, Gateway, GatewayConfig,
    GatewayResult, GivingLedger, SecretDecryptor,
};
use std::sync::{Arc, Mutex};

/// Secrets stored in plaintext
pub struct Plain;

impl SecretDecryptor for Plain {
    fn decrypt(&self, ciphertext: &str) -> GatewayResult<String> {
        Ok(ciphertext.to_string())
    }
}

pub fn config(gateway: Gateway) -> GatewayConfig {
    ConfigBuilder::new(Arc::new(Plain)).build_config(&gateway)
}

#[derive(Default)]
pub struct MemoryLedger {
    pub events: Mutex<Vec<EventLogEntry>>,
    pub donations: Mutex<Vec<DonationEntry>>,
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
        _transaction_id: &str,
        _status: DonationStatus,
    ) -> GatewayResult<()> {
        Ok(())
    }
}
