//! # gateway-providers
//!
//! Payment provider implementations for giving-gateway-rs.
//!
//! 1. **StripeProvider** - Stripe REST API (form-encoded)
//!    - PaymentIntents, Subscriptions, Customers, bank accounts, SetupIntents
//!    - Webhook endpoints tagged per church, `Stripe-Signature` verification
//!
//! 2. **PayPalProvider** - PayPal REST API (JSON, OAuth2 client credentials)
//!    - Order capture, billing plans and subscriptions, client tokens
//!    - Webhook verification through PayPal's verification endpoint
//!
//! 3. **PlaceholderProvider** - Square, ePayMints, KingdomFunding
//!    - Registered behind feature flags; webhook setup only
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gateway_core::{FeatureFlags, ProviderRegistry};
//! use gateway_providers::{BuiltinProviderFactory, ProviderEndpoints};
//!
//! let factory = BuiltinProviderFactory::new(ProviderEndpoints::from_env())?;
//! let registry = ProviderRegistry::new(Arc::new(factory), FeatureFlags::default())?;
//! let stripe = registry.get_provider("stripe")?;
//! ```

pub mod amount;
pub mod factory;
pub mod paypal;
pub mod placeholder;
pub mod stripe;

// Re-exports
pub use factory::{BuiltinProviderFactory, ProviderEndpoints};
pub use paypal::PayPalProvider;
pub use placeholder::PlaceholderProvider;
pub use stripe::{StripeClient, StripeProvider};
