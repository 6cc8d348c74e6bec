//! # giving-gateway
//!
//! Operator tool for the multi-tenant payment gateway layer.
//!
//! ## Usage
//!
//! ```bash
//! export GATEWAY_ENCRYPTION_KEY=...
//! export ENABLE_KINGDOMFUNDING=true
//!
//! giving-gateway providers
//! giving-gateway resolve church_1 --provider stripe --env sandbox,production
//! giving-gateway fees church_1 2500 --currency usd
//! giving-gateway seal sk_live_...
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON logs; `RUST_LOG` filters as usual.

use anyhow::Context;
use clap::Parser;
use gateway_app::cli::{Cli, Command};
use gateway_app::state::AppState;
use gateway_core::{capabilities_for, Gateway};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let state = AppState::from_env()?;
    run(&state, cli.command).await
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout carries command output
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Providers => {
            let providers: Vec<_> = state
                .registry
                .supported_providers()
                .into_iter()
                .map(|name| {
                    let capabilities = capabilities_for(name.as_str());
                    json!({ "provider": name, "capabilities": capabilities })
                })
                .collect();
            print_json(&json!({ "providers": providers }))
        }
        Command::Resolve { church_id, options } => {
            let gateway = state
                .service
                .gateway_for_church(&church_id, &options.to_resolve_options())
                .await?;
            info!(gateway_id = %gateway.id, provider = %gateway.provider, "Resolved");
            print_json(&describe(state, &gateway))
        }
        Command::Fees {
            church_id,
            amount,
            options,
            currency,
        } => {
            let gateway = state
                .service
                .gateway_for_church(&church_id, &options.to_resolve_options())
                .await?;
            let fee = state
                .service
                .calculate_fees(&gateway, amount, &church_id, currency.as_deref())
                .await?;
            print_json(&json!({
                "gatewayId": gateway.id,
                "provider": gateway.provider,
                "amount": amount,
                "fee": fee,
            }))
        }
        Command::Seal { plaintext } => {
            let secret_box = state
                .secret_box
                .as_ref()
                .context("GATEWAY_ENCRYPTION_KEY must be set to seal secrets")?;
            println!("{}", secret_box.seal(&plaintext)?);
            Ok(())
        }
    }
}

/// Non-secret view of a resolved gateway
fn describe(state: &AppState, gateway: &Gateway) -> serde_json::Value {
    let config = state.service.config_for(gateway);
    json!({
        "id": gateway.id,
        "churchId": gateway.church_id,
        "provider": gateway.provider,
        "environment": gateway.environment,
        "sandbox": config.is_sandbox(),
        "publicKey": gateway.public_key,
        "productId": gateway.product_id,
        "merchantId": config.merchant_id,
        "hasPrivateKey": !config.private_key.is_empty(),
        "hasWebhookKey": !config.webhook_key.is_empty(),
        "settings": gateway.settings,
        "capabilities": state.service.capabilities(gateway),
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
