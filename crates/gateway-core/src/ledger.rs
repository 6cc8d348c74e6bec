//! # Giving Ledger
//!
//! Collaborator that records provider events and donations on behalf of
//! providers' `log_event` / `log_donation` operations.

use crate::error::GatewayResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    #[default]
    Complete,
    Failed,
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Complete => "complete",
            DonationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A provider event as stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub church_id: String,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A donation as stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationEntry {
    pub church_id: String,
    pub provider: String,
    pub transaction_id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    /// "card", "ach", "paypal", ...
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: DonationStatus,
    pub donated_at: DateTime<Utc>,
}

#[async_trait]
pub trait GivingLedger: Send + Sync {
    async fn record_event(&self, entry: EventLogEntry) -> GatewayResult<()>;

    /// Returns the ledger's id for the donation
    async fn record_donation(&self, entry: DonationEntry) -> GatewayResult<String>;

    async fn set_donation_status(
        &self,
        church_id: &str,
        transaction_id: &str,
        status: DonationStatus,
    ) -> GatewayResult<()>;
}
