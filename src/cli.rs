//! CLI definitions for Invoice Harvester.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Invoice Harvester CLI.
#[derive(Parser)]
#[command(name = "invoice-harvester")]
#[command(about = "Download vendor invoices through a real browser session")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/default.toml",
        env = "HARVESTER_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the HTTP API in the foreground (default)
    Serve {
        /// Override server host
        #[arg(long)]
        host: Option<String>,

        /// Override server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one vendor job in the foreground and print its record
    Run {
        /// Vendor id
        vendor: String,

        #[command(flatten)]
        options: RunArgs,
    },

    /// Run every vendor one after another
    RunAll {
        #[command(flatten)]
        options: RunArgs,
    },

    /// List configured vendors
    Vendors {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Print the current one-time code for a shared secret
    Totp {
        /// Base32, hex or Base64 secret
        secret: String,
    },

    /// Show invoice counts per vendor from the ledger
    Status,
}

#[derive(Args, Clone, Default)]
pub(crate) struct RunArgs {
    /// Maximum number of invoices to consider
    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip invoices issued before this date (YYYY-MM-DD)
    #[arg(long)]
    pub from_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_subcommand() {
        let cli = Cli::try_parse_from(["invoice-harvester"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "invoice-harvester",
            "run",
            "amazon",
            "--limit",
            "5",
            "--from-date",
            "2024-02-01",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run { vendor, options }) => {
                assert_eq!(vendor, "amazon");
                assert_eq!(options.limit, Some(5));
                assert_eq!(options.from_date, NaiveDate::from_ymd_opt(2024, 2, 1));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(
            Cli::try_parse_from(["invoice-harvester", "run-all", "--from-date", "02/01/2024"])
                .is_err()
        );
    }

    #[test]
    fn test_serve_overrides() {
        let cli =
            Cli::try_parse_from(["invoice-harvester", "-c", "x.toml", "serve", "--port", "9000"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { host: None, port: Some(9000) })
        ));
    }
}
