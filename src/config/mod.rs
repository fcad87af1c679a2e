//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, MONGODB_URI, ...)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! Config is loaded once at startup. All fields have defaults.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, load_with_env, ConfigError};
pub use schema::{AppConfig, DatabaseConfig, LogFormat, ObservabilityConfig, ServerConfig};
pub use validation::ConfigIssue;
