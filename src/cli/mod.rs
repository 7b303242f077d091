//! CLI interface and argument parsing
//!
//! Every command loads the configuration named by `--config`, opens the
//! configured stores and exits with one of the codes in [`commands`].

pub mod commands;

use clap::{Parser, Subcommand};

/// Cohort - screening cohort distribution pipeline
#[derive(Parser, Debug)]
#[command(name = "cohort")]
#[command(version, about, long_about = None)]
#[command(author = "Cohort Manager Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cohort.toml", env = "COHORT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "COHORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hand out the next batch of records, or replay an earlier one
    Extract(commands::extract::ExtractArgs),

    /// Compare expected and processed record counts
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Query the request audit
    Audit(commands::audit::AuditArgs),

    /// Validate and commit a file of candidate records
    Ingest(commands::ingest::IngestArgs),

    /// Record inbound "records received" events from a file
    Metric(commands::metric::MetricArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_extract() {
        let cli = Cli::parse_from(["cohort", "extract", "--row-count", "50"]);
        assert_eq!(cli.config, "cohort.toml");
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.row_count, "50");
                assert!(args.request_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["cohort", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["cohort", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_reconcile() {
        let cli = Cli::parse_from(["cohort", "reconcile", "--since", "2025-01-01T00:00:00Z"]);
        match cli.command {
            Commands::Reconcile(args) => {
                assert_eq!(args.since.as_deref(), Some("2025-01-01T00:00:00Z"));
                assert!(!args.watch);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_reconcile_since_conflicts_with_watch() {
        let result = Cli::try_parse_from([
            "cohort",
            "reconcile",
            "--watch",
            "--since",
            "2025-01-01T00:00:00Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_audit_after() {
        let cli = Cli::parse_from(["cohort", "audit", "--after", "abc"]);
        assert!(matches!(cli.command, Commands::Audit(ref a) if a.after.as_deref() == Some("abc")));
        assert!(Cli::try_parse_from(["cohort", "audit", "--after", "a", "--status-code", "200"])
            .is_err());
    }

    #[test]
    fn test_cli_parse_ingest_and_metric() {
        let cli = Cli::parse_from(["cohort", "ingest", "--file", "in.json"]);
        assert!(matches!(cli.command, Commands::Ingest(_)));
        let cli = Cli::parse_from(["cohort", "metric", "-f", "metrics.json"]);
        assert!(matches!(cli.command, Commands::Metric(_)));
    }

    #[test]
    fn test_cli_extract_requires_row_count() {
        assert!(Cli::try_parse_from(["cohort", "extract"]).is_err());
    }
}
