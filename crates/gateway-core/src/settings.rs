//! # Gateway Settings
//!
//! Provider-specific settings shapes and the validator that narrows the
//! opaque settings blob stored on a [`Gateway`](crate::Gateway).
//!
//! Validation is structural only: unknown keys are dropped, known keys must
//! carry the right type. Nothing here talks to the remote provider.

use crate::gateway::ProviderKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings shared across all providers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fees_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_capture: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupFutureUsage {
    OnSession,
    OffSession,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSettings {
    #[serde(flatten)]
    pub base: BaseSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_fee_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_method: Option<CaptureMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_future_usage: Option<SetupFutureUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandingPage {
    Login,
    Billing,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAction {
    Continue,
    PayNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingPreference {
    GetFromFile,
    NoShipping,
    SetProvidedAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalSettings {
    #[serde(flatten)]
    pub base: BaseSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<LandingPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_action: Option<UserAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_preference: Option<ShippingPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_profile_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquareSettings {
    #[serde(flatten)]
    pub base: BaseSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Any JSON number; fractional values are kept as given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_money: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EPayMintsSettings {
    #[serde(flatten)]
    pub base: BaseSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_entry_mode: Option<String>,
}

/// Settings narrowed to the shape of one known provider
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedSettings {
    Stripe(StripeSettings),
    PayPal(PayPalSettings),
    Square(SquareSettings),
    EPayMints(EPayMintsSettings),
    KingdomFunding(BaseSettings),
}

impl ValidatedSettings {
    /// Narrow a raw settings blob for the given provider.
    ///
    /// Returns `None` when the blob is absent, the provider is not a known
    /// kind, or the blob does not fit the provider's shape.
    pub fn validate(kind: &ProviderKind, settings: Option<&serde_json::Value>) -> Option<Self> {
        let raw = settings?;
        if raw.is_null() {
            return None;
        }
        if !raw.is_object() {
            warn!(provider = %kind, "Gateway settings are not an object; ignoring");
            return None;
        }

        match kind {
            ProviderKind::Stripe => narrow(kind, raw).map(ValidatedSettings::Stripe),
            ProviderKind::PayPal => narrow(kind, raw).map(ValidatedSettings::PayPal),
            ProviderKind::Square => narrow(kind, raw).map(ValidatedSettings::Square),
            ProviderKind::EPayMints => narrow(kind, raw).map(ValidatedSettings::EPayMints),
            ProviderKind::KingdomFunding => {
                narrow(kind, raw).map(ValidatedSettings::KingdomFunding)
            }
            ProviderKind::Other(_) => None,
        }
    }

    /// Settings shared by every provider
    pub fn base(&self) -> &BaseSettings {
        match self {
            ValidatedSettings::Stripe(s) => &s.base,
            ValidatedSettings::PayPal(s) => &s.base,
            ValidatedSettings::Square(s) => &s.base,
            ValidatedSettings::EPayMints(s) => &s.base,
            ValidatedSettings::KingdomFunding(base) => base,
        }
    }

    pub fn as_stripe(&self) -> Option<&StripeSettings> {
        match self {
            ValidatedSettings::Stripe(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_paypal(&self) -> Option<&PayPalSettings> {
        match self {
            ValidatedSettings::PayPal(s) => Some(s),
            _ => None,
        }
    }

    /// Serialize back to a JSON object containing only the known keys
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            ValidatedSettings::Stripe(s) => serde_json::to_value(s),
            ValidatedSettings::PayPal(s) => serde_json::to_value(s),
            ValidatedSettings::Square(s) => serde_json::to_value(s),
            ValidatedSettings::EPayMints(s) => serde_json::to_value(s),
            ValidatedSettings::KingdomFunding(s) => serde_json::to_value(s),
        };
        // Plain structs of strings, bools and numbers always serialize.
        value.unwrap_or(serde_json::Value::Null)
    }
}

fn narrow<T: DeserializeOwned>(kind: &ProviderKind, raw: &serde_json::Value) -> Option<T> {
    match T::deserialize(raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!(provider = %kind, error = %e, "Gateway settings do not match provider shape");
            None
        }
    }
}
