//! Command-line parsing for the `giving-gateway` binary.

use clap::{Args, Parser, Subcommand};
use gateway_core::ResolveOptions;

/// Operator tool for the multi-tenant payment gateway layer
#[derive(Debug, Parser)]
#[command(name = "giving-gateway", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List registered providers and capabilities
    Providers,

    /// Show the gateway a church resolves to
    Resolve {
        church_id: String,

        #[command(flatten)]
        options: Selection,
    },

    /// Fee for an amount in minor units
    Fees {
        church_id: String,

        #[arg(allow_negative_numbers = true)]
        amount: i64,

        #[command(flatten)]
        options: Selection,

        /// ISO currency code
        #[arg(long)]
        currency: Option<String>,
    },

    /// Encrypt a secret for the gateways file
    Seal { plaintext: String },
}

/// Resolution filters given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct Selection {
    /// Provider tag, e.g. stripe
    #[arg(long)]
    pub provider: Option<String>,

    /// Exact gateway id; overrides the other filters
    #[arg(long = "gateway")]
    pub gateway_id: Option<String>,

    /// Environment preference, most preferred first
    #[arg(long = "env", value_delimiter = ',', value_parser = parse_environment)]
    pub environments: Option<Vec<String>>,
}

impl Selection {
    pub fn to_resolve_options(&self) -> ResolveOptions {
        let mut options = ResolveOptions {
            gateway_id: self.gateway_id.clone(),
            provider: self.provider.clone(),
            ..ResolveOptions::default()
        };
        if let Some(order) = &self.environments {
            options = options.with_environment_preference(order.iter().cloned());
        }
        options
    }
}

fn parse_environment(raw: &str) -> Result<String, String> {
    let env = raw.trim();
    if env.is_empty() {
        return Err("environment must not be empty".to_string());
    }
    Ok(env.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("giving-gateway").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_filters() {
        let command = parse(&[
            "resolve",
            "church_1",
            "--provider",
            "stripe",
            "--env",
            "sandbox, production",
        ])
        .unwrap();

        let Command::Resolve { church_id, options } = command else {
            panic!("expected resolve");
        };
        assert_eq!(church_id, "church_1");
        assert_eq!(options.provider.as_deref(), Some("stripe"));
        assert_eq!(
            options.environments,
            Some(vec!["sandbox".to_string(), "production".to_string()])
        );

        let resolve = options.to_resolve_options();
        assert_eq!(resolve.provider.as_deref(), Some("stripe"));
        assert!(resolve.gateway_id.is_none());
    }

    #[test]
    fn test_parse_gateway_id() {
        let command = parse(&["resolve", "church_1", "--gateway", "gw_2"]).unwrap();
        let Command::Resolve { options, .. } = command else {
            panic!("expected resolve");
        };
        assert_eq!(options.to_resolve_options().gateway_id.as_deref(), Some("gw_2"));
    }

    #[test]
    fn test_parse_fees() {
        let command = parse(&["fees", "church_1", "2500", "--currency", "EUR"]).unwrap();
        assert_eq!(
            command,
            Command::Fees {
                church_id: "church_1".to_string(),
                amount: 2500,
                options: Selection::default(),
                currency: Some("EUR".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_seal() {
        assert_eq!(
            parse(&["seal", "sk_live_1"]).unwrap(),
            Command::Seal {
                plaintext: "sk_live_1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        let kind = |args: &[&str]| parse(args).unwrap_err().kind();

        assert_eq!(kind(&[]), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
        assert_eq!(kind(&["refund"]), ErrorKind::InvalidSubcommand);
        assert_eq!(kind(&["fees", "church_1", "ten"]), ErrorKind::ValueValidation);
        assert_eq!(kind(&["resolve", "church_1", "--provider"]), ErrorKind::InvalidValue);
        assert_eq!(
            kind(&["resolve", "church_1", "--currency", "usd"]),
            ErrorKind::UnknownArgument
        );
        assert_eq!(kind(&["seal"]), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind(&["resolve", "church_1", "--env", "sandbox,,live"]), ErrorKind::ValueValidation);
    }
}
