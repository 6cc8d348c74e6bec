//! # Gateway Resolution
//!
//! Picks at most one [`Gateway`] out of a tenant's configured set.
//!
//! Precedence, most specific first:
//!
//! 1. `gateway_id` : exact id match, overrides every other filter
//! 2. `provider` : case-insensitive tag match, ties broken by environment
//! 3. a tenant with exactly one gateway gets that gateway
//! 4. environment preference over the whole set
//!
//! Ties that the environment preference cannot break fail closed as
//! [`ResolutionFailure::Ambiguous`]; no arbitrary winner is picked.

use crate::gateway::{Gateway, ProviderKind};
use serde::Deserialize;

/// Environment order used when the caller gives none
pub const DEFAULT_ENVIRONMENT_PREFERENCE: [&str; 4] = ["production", "live", "sandbox", "test"];

/// Filters for a resolution request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    #[serde(default)]
    pub gateway_id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub environment_preference: Option<Vec<String>>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select by gateway id
    pub fn gateway_id(id: impl Into<String>) -> Self {
        Self {
            gateway_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Select by provider tag
    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::default()
        }
    }

    /// Builder: set environment preference order
    pub fn with_environment_preference<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_preference = Some(order.into_iter().map(Into::into).collect());
        self
    }

    fn environment_order(&self) -> Vec<String> {
        match &self.environment_preference {
            Some(order) => order.iter().map(|env| env.trim().to_lowercase()).collect(),
            None => DEFAULT_ENVIRONMENT_PREFERENCE
                .iter()
                .map(|env| env.to_string())
                .collect(),
        }
    }
}

/// Why resolution produced no gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// No candidate matched the filter
    NotFound,
    /// Two or more candidates tied at the best environment weight
    Ambiguous,
}

/// Resolve a single gateway from `gateways` according to `options`.
pub fn resolve<'a>(
    gateways: &'a [Gateway],
    options: &ResolveOptions,
) -> Result<&'a Gateway, ResolutionFailure> {
    if let Some(gateway_id) = options.gateway_id.as_deref() {
        return gateways
            .iter()
            .find(|gateway| gateway.id == gateway_id)
            .ok_or(ResolutionFailure::NotFound);
    }

    let environment_order = options.environment_order();

    if let Some(provider) = options.provider.as_deref() {
        let provider = ProviderKind::parse(provider);
        let matches: Vec<&Gateway> = gateways
            .iter()
            .filter(|gateway| gateway.kind() == provider)
            .collect();

        if matches.is_empty() {
            return Err(ResolutionFailure::NotFound);
        }
        return pick_by_environment(&matches, &environment_order);
    }

    if let [only] = gateways {
        return Ok(only);
    }

    let all: Vec<&Gateway> = gateways.iter().collect();
    pick_by_environment(&all, &environment_order)
}

/// Priority weight of a gateway's environment tag; lower is better.
/// Tags absent from the order weigh `order.len()`.
fn environment_weight(gateway: &Gateway, order: &[String]) -> usize {
    let env = gateway
        .environment
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    order
        .iter()
        .position(|candidate| *candidate == env)
        .unwrap_or(order.len())
}

fn pick_by_environment<'a>(
    candidates: &[&'a Gateway],
    order: &[String],
) -> Result<&'a Gateway, ResolutionFailure> {
    let best = candidates
        .iter()
        .map(|gateway| environment_weight(gateway, order))
        .min()
        .ok_or(ResolutionFailure::NotFound)?;

    let mut winners = candidates
        .iter()
        .filter(|gateway| environment_weight(gateway, order) == best);

    match (winners.next(), winners.next()) {
        (Some(winner), None) => Ok(*winner),
        (Some(_), Some(_)) => Err(ResolutionFailure::Ambiguous),
        (None, _) => Err(ResolutionFailure::NotFound),
    }
}
