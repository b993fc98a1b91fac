//! Ryanvk Runtime - hosting layer for the Ryanvk capability engine.
//!
//! This crate provides:
//! - Configuration loading and validation (`ConfigLoader`)
//! - Logging configuration (`LoggingBuilder`)
//! - Per-protocol composition and per-account staffs (`ProtocolRegistry`)
//! - Runtime orchestration (`RyanvkRuntime`)
//! - Capabilities as tower services (`CapabilityService`)
//!
//! ```ignore
//! use ryanvk_runtime::RyanvkRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = RyanvkRuntime::builder().build().await?;
//!     let staff = runtime.connect("qq", "10001", Components::new()).await?;
//!     staff.call(&SEND_MESSAGE, message).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod service;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, ProtocolConfig, RyanvkConfig, SubsetRef};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError};
pub use registry::{ACCOUNT_COMPONENT, ProtocolRegistry, compose_protocol};
pub use runtime::{RuntimeBuilder, RyanvkRuntime};
pub use service::CapabilityService;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
