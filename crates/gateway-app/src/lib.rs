//! # gateway-app
//!
//! Process wiring for giving-gateway: environment configuration, the
//! file-backed gateway repository, the secret box for stored credentials,
//! and the command-line front end.
//!
//! ```text
//! .env / environment ──► AppConfig ──► AppState
//!                                        ├── ProviderRegistry (feature flags)
//!                                        ├── ConfigBuilder (SecretBox)
//!                                        ├── TomlGatewayRepository
//!                                        └── GatewayService
//! ```

pub mod cli;
pub mod repository;
pub mod secrets;
pub mod state;

pub use cli::{Cli, Command, Selection};
pub use repository::{GatewayFile, TomlGatewayRepository};
pub use secrets::{NoKeyDecryptor, SecretBox};
pub use state::{AppConfig, AppState};
