//! Configuration for the Ryanvk runtime.
//!
//! Settings come from `ryanvk.toml` (or YAML), `RYANVK_*` environment
//! variables and programmatic defaults, layered with figment.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ProtocolConfig, RyanvkConfig,
    SpanEventConfig, SubsetRef,
};
pub use validation::validate_config;
