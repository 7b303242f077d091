//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CohortConfig, DatabaseTarget, Environment};
use super::secret_string;
use crate::domain::errors::CohortError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CohortConfig
/// 4. Applies environment variable overrides (COHORT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `CohortError::Configuration` if the file is missing or unreadable,
/// a referenced environment variable is unset, the TOML is malformed, or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use cohort::config::loader::load_config;
///
/// let config = load_config("cohort.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CohortConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CohortError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CohortError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// Applies the same substitution, overrides and validation as [`load_config`].
pub fn parse_config(contents: &str) -> Result<CohortConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CohortConfig = toml::from_str(&contents)
        .map_err(|e| CohortError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        CohortError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced environment variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CohortError::Configuration(format!("Invalid substitution pattern: {}", e)))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(CohortError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CohortError::Configuration(format!("Invalid value '{}' for {}", value, name))
    })
}

/// Applies environment variable overrides using COHORT_* prefix
///
/// Environment variables follow the pattern: COHORT_<SECTION>_<KEY>
/// For example: COHORT_EXTRACTION_MAX_ROW_COUNT, COHORT_POSTGRESQL_SSL_MODE
fn apply_env_overrides(config: &mut CohortConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("COHORT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("COHORT_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("COHORT_APPLICATION_DRY_RUN", &val)?;
    }

    if let Ok(val) = std::env::var("COHORT_ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(CohortError::Configuration(format!(
                    "Invalid value '{}' for COHORT_ENVIRONMENT",
                    other
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("COHORT_DATABASE_TARGET") {
        config.database_target = match val.to_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(CohortError::Configuration(format!(
                    "Invalid value '{}' for COHORT_DATABASE_TARGET",
                    other
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.postgresql {
        if let Ok(val) = std::env::var("COHORT_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("COHORT_POSTGRESQL_MAX_CONNECTIONS") {
            pg.max_connections = parse_override("COHORT_POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
        if let Ok(val) = std::env::var("COHORT_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // Extraction overrides
    if let Ok(val) = std::env::var("COHORT_EXTRACTION_MAX_ROW_COUNT") {
        config.extraction.max_row_count =
            parse_override("COHORT_EXTRACTION_MAX_ROW_COUNT", &val)?;
    }
    if let Ok(val) = std::env::var("COHORT_EXTRACTION_MAX_RETRIES") {
        config.extraction.retry.max_retries =
            parse_override("COHORT_EXTRACTION_MAX_RETRIES", &val)?;
    }

    // Reconciliation overrides
    if let Ok(val) = std::env::var("COHORT_RECONCILIATION_INTERVAL_SECONDS") {
        config.reconciliation.interval_seconds =
            parse_override("COHORT_RECONCILIATION_INTERVAL_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("COHORT_RECONCILIATION_DEFAULT_LOOKBACK_HOURS") {
        config.reconciliation.default_lookback_hours =
            parse_override("COHORT_RECONCILIATION_DEFAULT_LOOKBACK_HOURS", &val)?;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("COHORT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("COHORT_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("COHORT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
