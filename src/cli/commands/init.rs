//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "cohort.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing cohort configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG_ERROR);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set database_target to 'postgresql' or 'memory'");
                println!("  3. Export COHORT_PG_CONNECTION (or add it to .env)");
                println!("  4. Validate configuration: cohort validate-config");
                println!("  5. Start reconciliation: cohort reconcile --watch");
                println!();
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(EXIT_FAILURE)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Cohort distribution pipeline configuration

environment = "development"
database_target = "memory"  # memory | postgresql

[application]
log_level = "info"
dry_run = false

# [postgresql]
# connection_string = "${COHORT_PG_CONNECTION}"
# ssl_mode = "require"

[extraction]
max_row_count = 1000

[ingestion]
max_concurrency = 8

[reconciliation]
interval_seconds = 3600
default_lookback_hours = 24
process_name = "AuditProcess"

[logging]
local_enabled = true
local_path = "/var/log/cohort"
local_rotation = "daily"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Cohort distribution pipeline configuration
#
# Every option is listed with its default. Values of the form ${VAR} are
# read from the environment; any COHORT_<SECTION>_<KEY> variable overrides
# the file.

# ============================================================================
# Environment and storage
# ============================================================================
# development | staging | production
# Production requires PostgreSQL with ssl_mode = "require".
environment = "development"

# memory | postgresql
# The memory backend keeps nothing between runs.
database_target = "memory"

[application]
# trace, debug, info, warn, error
log_level = "info"

# Scheduled reconciliation runs but does not advance its cursor
dry_run = false

# ============================================================================
# PostgreSQL
# ============================================================================
# Uncomment when database_target = "postgresql". The schema migration in
# migrations/001_initial_schema.sql is applied on startup.
#
# [postgresql]
# connection_string = "${COHORT_PG_CONNECTION}"
# max_connections = 10
# connection_timeout_seconds = 30
# statement_timeout_seconds = 60
# ssl_mode = "prefer"               # disable | prefer | require
# ssl_root_cert = "/etc/ssl/certs/cohort-ca.pem"

# ============================================================================
# Batch extraction
# ============================================================================
[extraction]
# Largest batch handed out per request (rowCount is capped to this)
max_row_count = 1000

# Retries when a concurrent caller claims every selected row first
[extraction.retry]
max_retries = 3
initial_delay_ms = 100
max_delay_ms = 5000
backoff_multiplier = 2.0

# ============================================================================
# Validation pipeline
# ============================================================================
[ingestion]
# Subjects validated concurrently by bulk ingestion
max_concurrency = 8

# Cohort name stamped on exception entries
# cohort_name = "Breast Screening"

# ============================================================================
# Reconciliation
# ============================================================================
[reconciliation]
interval_seconds = 3600

# Window used when no previous run is recorded
default_lookback_hours = 24

# Inbound metrics with this process name count as expected records
process_name = "AuditProcess"

# Grace period for an in-flight run on shutdown
shutdown_timeout_secs = 30

# ============================================================================
# Logging
# ============================================================================
[logging]
local_enabled = true
local_path = "/var/log/cohort"
local_rotation = "daily"            # daily | hourly | never
"#
        .to_string()
    }
}
