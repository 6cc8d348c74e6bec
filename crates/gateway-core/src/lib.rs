//! # gateway-core
//!
//! Core types and traits for the giving-gateway payment abstraction.
//!
//! This crate provides:
//! - `GatewayProvider` trait for implementing payment providers
//! - `ProviderRegistry` for feature-flagged provider lookup
//! - `resolve` for picking a tenant's gateway among many
//! - `ConfigBuilder` for turning stored gateways into runtime configs
//! - `ValidatedSettings` and `ProviderCapabilities` for per-provider data
//! - `GatewayService` composing all of the above
//! - `GatewayError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use gateway_core::{ChargeRequest, GatewayService, ResolveOptions};
//!
//! // Pick the church's Stripe gateway, preferring sandbox over production
//! let options = ResolveOptions::provider("stripe")
//!     .with_environment_preference(["sandbox", "production"]);
//! let gateway = service.gateway_for_church("church_1", &options).await?;
//!
//! // Charge through whichever provider the gateway names
//! let charge = ChargeRequest { amount: 2500, currency: "usd".into(), ..Default::default() };
//! let result = service.process_charge(&gateway, &charge).await?;
//! ```

pub mod capabilities;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod provider;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod settings;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use capabilities::{capabilities_for, CapabilityKey, ProviderCapabilities};
pub use config::{ConfigBuilder, SecretDecryptor};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, GatewayConfig, ProviderKind};
pub use ledger::{DonationEntry, DonationStatus, EventLogEntry, GivingLedger};
pub use provider::{
    BankAccountUpdate, BoxedGatewayProvider, CardUpdate, ChargeRequest, ChargeResult,
    GatewayProvider, Interval, OptionalOperation, OrderRequest, PlanRequest, ProviderEvent,
    SubscriptionRequest, SubscriptionResult, WebhookEndpoint, WebhookHeaders, WebhookResult,
};
pub use registry::{FeatureFlags, ProviderFactory, ProviderRegistry};
pub use repository::GatewayRepository;
pub use resolver::{resolve, ResolutionFailure, ResolveOptions, DEFAULT_ENVIRONMENT_PREFERENCE};
pub use service::GatewayService;
pub use settings::{
    BaseSettings, EPayMintsSettings, PayPalSettings, SquareSettings, StripeSettings,
    ValidatedSettings,
};
