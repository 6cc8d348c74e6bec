//! # Gateway Error Types
//!
//! Typed error handling for gateway resolution and provider dispatch.
//! Every fallible operation returns `Result<T, GatewayError>`.

use thiserror::Error;

/// Core error type for gateway resolution and provider operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors (missing mandatory provider, bad env values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No gateway matched the tenant and filter
    #[error("{message}")]
    GatewayNotFound { church_id: String, message: String },

    /// Two or more equally-ranked gateways matched
    #[error("{message}")]
    AmbiguousGateway { church_id: String, message: String },

    /// Requested provider tag is not registered
    #[error("Unsupported payment gateway: {provider}. Available providers: {}", .available.join(", "))]
    ProviderLookup {
        provider: String,
        available: Vec<String>,
    },

    /// Optional operation invoked on a provider that does not implement it
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation { provider: String, operation: String },

    /// Secret could not be sealed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Stored secret could not be decrypted
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Registration refused by the current feature flags
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Gateway repository failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// Donation ledger failure
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Shorthand for an [`GatewayError::UnsupportedOperation`]
    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        GatewayError::UnsupportedOperation {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    /// Shorthand for a remote provider failure
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns true if a caller could reasonably retry.
    ///
    /// Nothing in this crate retries; the flag is informational for outer layers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::Provider { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Configuration(_) => 500,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::GatewayNotFound { .. } => 404,
            GatewayError::AmbiguousGateway { .. } => 409,
            GatewayError::ProviderLookup { .. } => 400,
            GatewayError::UnsupportedOperation { .. } => 501,
            GatewayError::Encryption(_) => 500,
            GatewayError::Decryption(_) => 500,
            GatewayError::RegistrationRejected(_) => 403,
            GatewayError::Provider { .. } => 502,
            GatewayError::Network(_) => 503,
            GatewayError::WebhookVerificationFailed(_) => 401,
            GatewayError::Repository(_) => 500,
            GatewayError::Ledger(_) => 500,
            GatewayError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
