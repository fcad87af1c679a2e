//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port > 0, body limit > 0)
//! - Check that connection settings are usable
//!
//! Returns every problem found, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting all issues.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.server.port == 0 {
        issues.push(ConfigIssue::new("server.port", "must be greater than 0"));
    }
    if config.server.max_body_bytes == 0 {
        issues.push(ConfigIssue::new("server.max_body_bytes", "must be greater than 0"));
    }

    let uri = config.database.uri.trim();
    if uri.is_empty() {
        issues.push(ConfigIssue::new("database.uri", "must not be empty"));
    } else if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
        issues.push(ConfigIssue::new(
            "database.uri",
            "must start with mongodb:// or mongodb+srv://",
        ));
    }
    if config.database.name.trim().is_empty() {
        issues.push(ConfigIssue::new("database.name", "must not be empty"));
    }
    if config.database.collection.trim().is_empty() {
        issues.push(ConfigIssue::new("database.collection", "must not be empty"));
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        issues.push(ConfigIssue::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
