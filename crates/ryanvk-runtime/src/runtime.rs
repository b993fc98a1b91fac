//! Runtime orchestration.
//!
//! [`RyanvkRuntime`] ties the pieces together: it loads and validates the
//! configuration, installs logging, composes every configured protocol and
//! hands out per-account staffs.

use std::path::Path;

use ryanvk_core::{Components, Staff};
use tracing::info;

use crate::config::{ConfigLoader, ProtocolConfig, RyanvkConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::registry::ProtocolRegistry;

/// The Ryanvk runtime.
pub struct RyanvkRuntime {
    config: RyanvkConfig,
    registry: ProtocolRegistry,
}

impl RyanvkRuntime {
    /// Creates a runtime builder for custom configuration.
    ///
    /// ```rust,ignore
    /// let runtime = RyanvkRuntime::builder()
    ///     .config_file("deploy/ryanvk.toml")
    ///     .profile("production")
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, initialises logging and composes its protocols.
    ///
    /// An already installed subscriber is kept; a log file that cannot be
    /// opened is an error.
    pub async fn from_config(config: RyanvkConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging)?;

        let registry = ProtocolRegistry::from_config(&config).await?;

        info!(
            log_level = %config.logging.level,
            protocols = config.protocols.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &RyanvkConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Creates the staff of an account that just came online.
    pub async fn connect(
        &self,
        protocol: &str,
        account: &str,
        components: Components,
    ) -> RuntimeResult<Staff> {
        self.registry
            .register_account(protocol, account, components)
            .await
    }

    /// Drops an account that went offline.
    pub async fn disconnect(&self, protocol: &str, account: &str) -> RuntimeResult<()> {
        self.registry.unregister_account(protocol, account).await
    }
}

/// Loads the configuration, then creates a [`RyanvkRuntime`].
///
/// ```rust,ignore
/// let runtime = RyanvkRuntime::builder()
///     .configure(|loader| loader.without_env())
///     .protocol(ProtocolConfig {
///         name: "console".into(),
///         collectors: vec![SubsetRef { namespace: "console".into(), identify: None }],
///     })
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    extra_protocols: Vec<ProtocolConfig>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjusts the underlying [`ConfigLoader`].
    pub fn configure(mut self, f: impl FnOnce(ConfigLoader) -> ConfigLoader) -> Self {
        self.loader = f(self.loader);
        self
    }

    pub fn config_file(self, path: impl AsRef<Path>) -> Self {
        self.configure(|loader| loader.file(path))
    }

    pub fn profile(self, profile: impl Into<String>) -> Self {
        self.configure(|loader| loader.profile(profile))
    }

    pub fn search_path(self, path: impl AsRef<Path>) -> Self {
        self.configure(|loader| loader.search_path(path))
    }

    /// Adds a protocol after the configured ones.
    ///
    /// Figment replaces arrays when merging, so protocols given here are
    /// appended to the loaded list instead of going through the loader.
    pub fn protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.extra_protocols.push(protocol);
        self
    }

    pub async fn build(self) -> RuntimeResult<RyanvkRuntime> {
        let mut config = self.loader.load()?;
        config.protocols.extend(self.extra_protocols);
        RyanvkRuntime::from_config(config).await
    }
}
