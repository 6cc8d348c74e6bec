//! # Provider Registry
//!
//! Name → provider table shared by every request in the process.
//!
//! - `stripe` and `paypal` are mandatory: always present, never removable.
//! - `square`, `epaymints` and `kingdomfunding` follow their feature flags.
//!   Flag syncing is idempotent and only ever removes entries a flag added.
//! - Anything else can be registered only when custom providers are enabled.
//!
//! The registry is an explicit value built once at startup and shared by
//! reference; a single mutex guards the table and flags together.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ProviderKind;
use crate::provider::BoxedGatewayProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Switches controlling optional providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default)]
    pub enable_square: bool,
    #[serde(default)]
    pub enable_epaymints: bool,
    /// Placeholder provider
    #[serde(default)]
    pub enable_kingdomfunding: bool,
    #[serde(default)]
    pub enable_custom_providers: bool,
}

impl FeatureFlags {
    fn optional_providers(&self) -> [(ProviderKind, bool); 3] {
        [
            (ProviderKind::Square, self.enable_square),
            (ProviderKind::EPayMints, self.enable_epaymints),
            (ProviderKind::KingdomFunding, self.enable_kingdomfunding),
        ]
    }
}

/// Instantiates built-in providers for the registry
pub trait ProviderFactory: Send + Sync {
    /// `None` when this factory has no implementation for `kind`
    fn create(&self, kind: &ProviderKind) -> Option<BoxedGatewayProvider>;
}

struct RegistryState {
    /// Insertion-ordered
    providers: Vec<(String, BoxedGatewayProvider)>,
    flags: FeatureFlags,
    /// Names currently present only because a flag added them
    flag_keys: HashSet<String>,
}

impl RegistryState {
    fn get(&self, key: &str) -> Option<&BoxedGatewayProvider> {
        self.providers
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, provider)| provider)
    }

    fn insert(&mut self, key: String, provider: BoxedGatewayProvider) {
        match self.providers.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = provider,
            None => self.providers.push((key, provider)),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|(name, _)| name != key);
        self.flag_keys.remove(key);
        self.providers.len() != before
    }
}

/// Table key for a provider tag: trimmed and lowercased
fn registry_key(name: &str) -> String {
    ProviderKind::parse(name).as_str().to_string()
}

/// Registry of provider instances keyed by lowercase tag
pub struct ProviderRegistry {
    factory: Arc<dyn ProviderFactory>,
    state: Mutex<RegistryState>,
}

impl ProviderRegistry {
    /// Create a registry holding the mandatory providers plus whatever
    /// `flags` enables.
    ///
    /// Fails if `factory` cannot build a mandatory provider.
    pub fn new(factory: Arc<dyn ProviderFactory>, flags: FeatureFlags) -> GatewayResult<Self> {
        let mut state = RegistryState {
            providers: Vec::new(),
            flags,
            flag_keys: HashSet::new(),
        };

        for kind in ProviderKind::MANDATORY {
            let provider = factory.create(&kind).ok_or_else(|| {
                GatewayError::Configuration(format!("No implementation for mandatory provider {}", kind))
            })?;
            state.insert(kind.as_str().to_string(), provider);
        }

        sync_flag_providers(factory.as_ref(), &mut state);

        Ok(Self {
            factory,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every mutation completes before the guard drops, so a poisoned
        // table is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a provider by tag (case-insensitive)
    pub fn get_provider(&self, name: &str) -> GatewayResult<BoxedGatewayProvider> {
        let key = registry_key(name);
        let state = self.lock();
        state
            .get(&key)
            .cloned()
            .ok_or_else(|| GatewayError::ProviderLookup {
                provider: name.to_string(),
                available: state.providers.iter().map(|(n, _)| n.clone()).collect(),
            })
    }

    /// Check if a provider is registered
    pub fn is_available(&self, name: &str) -> bool {
        self.lock().get(&registry_key(name)).is_some()
    }

    /// Registered tags, in registration order
    pub fn supported_providers(&self) -> Vec<String> {
        self.lock()
            .providers
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Register a provider under `name`.
    ///
    /// Rejected unless custom providers are enabled, except for the
    /// mandatory tags.
    pub fn register_provider(
        &self,
        name: &str,
        provider: BoxedGatewayProvider,
    ) -> GatewayResult<()> {
        let kind = ProviderKind::parse(name);
        let key = kind.as_str().to_string();
        if key.is_empty() {
            return Err(GatewayError::RegistrationRejected(
                "Provider name must not be empty".to_string(),
            ));
        }

        let mut state = self.lock();
        if !state.flags.enable_custom_providers && !kind.is_mandatory() {
            return Err(GatewayError::RegistrationRejected(
                "Custom gateway providers are disabled. Enable via ENABLE_CUSTOM_GATEWAY_PROVIDERS."
                    .to_string(),
            ));
        }

        // Explicit registrations are never removed by flag syncing
        state.flag_keys.remove(&key);
        state.insert(key.clone(), provider);
        info!(provider = %key, "Registered gateway provider");
        Ok(())
    }

    /// Remove a provider. Mandatory providers are refused with `false`.
    pub fn unregister_provider(&self, name: &str) -> bool {
        let kind = ProviderKind::parse(name);
        let key = kind.as_str().to_string();
        if kind.is_mandatory() {
            warn!(provider = %key, "Cannot unregister core provider");
            return false;
        }

        let removed = self.lock().remove(&key);
        if removed {
            info!(provider = %key, "Unregistered gateway provider");
        }
        removed
    }

    /// Replace the feature flags and sync flag-gated providers
    pub fn set_feature_flags(&self, flags: FeatureFlags) {
        let mut state = self.lock();
        state.flags = flags;
        sync_flag_providers(self.factory.as_ref(), &mut state);
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.lock().flags
    }
}

fn sync_flag_providers(factory: &dyn ProviderFactory, state: &mut RegistryState) {
    for (kind, enabled) in state.flags.optional_providers() {
        let key = kind.as_str().to_string();
        let registered = state.get(&key).is_some();

        if enabled {
            if registered {
                continue;
            }
            match factory.create(&kind) {
                Some(provider) => {
                    state.insert(key.clone(), provider);
                    state.flag_keys.insert(key.clone());
                    debug!(provider = %key, "Enabled flag-gated provider");
                }
                None => warn!(provider = %key, "Flag enabled but no implementation available"),
            }
        } else if registered && state.flag_keys.contains(&key) {
            state.remove(&key);
            debug!(provider = %key, "Disabled flag-gated provider");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubFactory, StubProvider};

    fn registry(flags: FeatureFlags) -> (Arc<StubFactory>, ProviderRegistry) {
        let factory = Arc::new(StubFactory::default());
        let registry = ProviderRegistry::new(factory.clone(), flags).unwrap();
        (factory, registry)
    }

    #[test]
    fn test_mandatory_providers_always_present() {
        let (_, registry) = registry(FeatureFlags::default());
        assert_eq!(registry.supported_providers(), vec!["stripe", "paypal"]);
        assert!(registry.is_available("Stripe"));
        assert!(!registry.is_available("square"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (_, registry) = registry(FeatureFlags::default());
        let upper = registry.get_provider("STRIPE").unwrap();
        let lower = registry.get_provider("stripe").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let (_, registry) = registry(FeatureFlags::default());
        match registry.get_provider("venmo") {
            Err(GatewayError::ProviderLookup { provider, available }) => {
                assert_eq!(provider, "venmo");
                assert_eq!(available, vec!["stripe", "paypal"]);
            }
            other => panic!("expected ProviderLookup, got {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn test_flag_toggling_is_idempotent() {
        let (factory, registry) = registry(FeatureFlags::default());
        let on = FeatureFlags {
            enable_square: true,
            ..FeatureFlags::default()
        };

        registry.set_feature_flags(on);
        registry.set_feature_flags(FeatureFlags::default());
        registry.set_feature_flags(on);
        registry.set_feature_flags(on);

        let squares = registry
            .supported_providers()
            .into_iter()
            .filter(|name| name == "square")
            .count();
        assert_eq!(squares, 1);
        // Built on the two enables that found it missing, not on the repeat
        assert_eq!(factory.created("square"), 2);
    }

    #[test]
    fn test_flag_off_removes_flag_providers_only() {
        let (_, registry) = registry(FeatureFlags {
            enable_epaymints: true,
            enable_custom_providers: true,
            ..FeatureFlags::default()
        });
        assert!(registry.is_available("epaymints"));

        // A custom registration under a flag-gated name survives flag syncing
        registry
            .register_provider("Square", Arc::new(StubProvider::new("square")))
            .unwrap();

        registry.set_feature_flags(FeatureFlags {
            enable_custom_providers: true,
            ..FeatureFlags::default()
        });

        assert!(!registry.is_available("epaymints"));
        assert!(registry.is_available("square"));
        assert!(registry.is_available("stripe"));
        assert!(registry.is_available("paypal"));
    }

    #[test]
    fn test_unregister_mandatory_refused() {
        let (_, registry) = registry(FeatureFlags::default());
        assert!(!registry.unregister_provider("stripe"));
        assert!(!registry.unregister_provider("PAYPAL"));
        assert!(registry.is_available("stripe"));
        assert!(registry.is_available("paypal"));
    }

    #[test]
    fn test_unregister_flag_provider() {
        let (_, registry) = registry(FeatureFlags {
            enable_kingdomfunding: true,
            ..FeatureFlags::default()
        });
        assert!(registry.unregister_provider("kingdomfunding"));
        assert!(!registry.unregister_provider("kingdomfunding"));
    }

    #[test]
    fn test_names_are_trimmed_before_lookup_and_registration() {
        let (_, registry) = registry(FeatureFlags::default());
        let stripe = registry.get_provider("stripe").unwrap();
        assert!(Arc::ptr_eq(&registry.get_provider(" Stripe ").unwrap(), &stripe));
        assert!(registry.is_available("paypal\t"));

        // A padded mandatory name replaces the mandatory entry, never adds one
        registry
            .register_provider("stripe ", Arc::new(StubProvider::new("stripe")))
            .unwrap();
        assert_eq!(registry.supported_providers(), vec!["stripe", "paypal"]);

        // Padding does not turn a custom name into an exempt one
        let result = registry.register_provider(" acme ", Arc::new(StubProvider::new("acme")));
        assert!(matches!(result, Err(GatewayError::RegistrationRejected(_))));
        assert!(!registry.unregister_provider(" PAYPAL "));
        assert!(registry.is_available("paypal"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let (_, registry) = registry(FeatureFlags {
            enable_custom_providers: true,
            ..FeatureFlags::default()
        });
        let result = registry.register_provider("   ", Arc::new(StubProvider::new("blank")));
        assert!(matches!(result, Err(GatewayError::RegistrationRejected(_))));
        assert_eq!(registry.supported_providers(), vec!["stripe", "paypal"]);
    }

    #[test]
    fn test_custom_registration_requires_flag() {
        let (_, registry) = registry(FeatureFlags::default());
        let result = registry.register_provider("acme", Arc::new(StubProvider::new("acme")));
        assert!(matches!(result, Err(GatewayError::RegistrationRejected(_))));
        assert!(!registry.is_available("acme"));

        // Mandatory names may always be replaced
        registry
            .register_provider("Stripe", Arc::new(StubProvider::new("stripe")))
            .unwrap();

        registry.set_feature_flags(FeatureFlags {
            enable_custom_providers: true,
            ..FeatureFlags::default()
        });
        registry
            .register_provider("ACME", Arc::new(StubProvider::new("acme")))
            .unwrap();
        assert!(registry.is_available("acme"));
        assert_eq!(registry.supported_providers(), vec!["stripe", "paypal", "acme"]);
    }

    #[test]
    fn test_missing_mandatory_implementation_fails() {
        let factory = Arc::new(StubFactory::without(&[ProviderKind::PayPal]));
        assert!(matches!(
            ProviderRegistry::new(factory, FeatureFlags::default()),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn test_concurrent_flag_updates_stay_consistent() {
        let (_, registry) = registry(FeatureFlags::default());
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.set_feature_flags(FeatureFlags {
                            enable_square: i % 2 == 0,
                            enable_epaymints: true,
                            ..FeatureFlags::default()
                        });
                        let _ = registry.get_provider("stripe");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let names = registry.supported_providers();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(names.iter().filter(|n| *n == "epaymints").count(), 1);
        assert!(registry.is_available("stripe"));
        assert!(registry.is_available("paypal"));
    }
}
