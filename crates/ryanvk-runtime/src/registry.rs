//! Protocol registry: composed layers per protocol and a staff per account.
//!
//! Protocols are composed once, from the exported collectors listed in the
//! configuration. Accounts come and go at run time; each gets a long-lived
//! [`Staff`] over its protocol's layers, carrying an `account` component.

use std::collections::HashMap;
use std::sync::Arc;

use ryanvk_core::{Components, Composition, Staff, compose, compose_subset};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ProtocolConfig, RyanvkConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Component name under which each account staff carries its account id.
pub const ACCOUNT_COMPONENT: &str = "account";

/// Composed protocols and the live staff of each account.
#[derive(Default)]
pub struct ProtocolRegistry {
    protocols: Arc<RwLock<HashMap<String, Composition>>>,
    staffs: Arc<RwLock<HashMap<(String, String), Staff>>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes every protocol listed in `config`.
    pub async fn from_config(config: &RyanvkConfig) -> RuntimeResult<Self> {
        let registry = Self::new();
        for protocol in &config.protocols {
            let composition = compose_protocol(protocol)?;
            registry.add_protocol(&protocol.name, composition).await?;
        }
        Ok(registry)
    }

    /// Registers an already composed protocol.
    pub async fn add_protocol(&self, name: &str, composition: Composition) -> RuntimeResult<()> {
        let mut protocols = self.protocols.write().await;
        if protocols.contains_key(name) {
            return Err(RuntimeError::ProtocolExists(name.to_owned()));
        }
        info!(protocol = %name, layers = composition.len(), "Registered protocol");
        protocols.insert(name.to_owned(), composition);
        Ok(())
    }

    pub async fn composition(&self, protocol: &str) -> Option<Composition> {
        self.protocols.read().await.get(protocol).cloned()
    }

    pub async fn protocol_names(&self) -> Vec<String> {
        self.protocols.read().await.keys().cloned().collect()
    }

    /// Creates the staff of a newly connected account.
    ///
    /// `components` typically carries the account's connection; the account id
    /// is added as [`ACCOUNT_COMPONENT`].
    pub async fn register_account(
        &self,
        protocol: &str,
        account: &str,
        components: Components,
    ) -> RuntimeResult<Staff> {
        let composition = self
            .composition(protocol)
            .await
            .ok_or_else(|| RuntimeError::ProtocolNotFound(protocol.to_owned()))?;

        let mut staffs = self.staffs.write().await;
        let key = (protocol.to_owned(), account.to_owned());
        if staffs.contains_key(&key) {
            return Err(RuntimeError::AccountExists {
                protocol: protocol.to_owned(),
                account: account.to_owned(),
            });
        }

        let staff = Staff::new(
            composition,
            components.with(ACCOUNT_COMPONENT, account.to_owned()),
        );
        info!(protocol = %protocol, account = %account, "Registered account");
        staffs.insert(key, staff.clone());
        Ok(staff)
    }

    /// Drops an account's staff and shuts its performers down.
    ///
    /// A failing exit hook is logged; the account is gone either way.
    pub async fn unregister_account(&self, protocol: &str, account: &str) -> RuntimeResult<()> {
        let removed = self
            .staffs
            .write()
            .await
            .remove(&(protocol.to_owned(), account.to_owned()));
        let Some(staff) = removed else {
            return Err(RuntimeError::AccountNotFound {
                protocol: protocol.to_owned(),
                account: account.to_owned(),
            });
        };

        if let Err(err) = staff.shutdown().await {
            warn!(protocol = %protocol, account = %account, error = %err, "Account shutdown failed");
        }
        info!(protocol = %protocol, account = %account, "Unregistered account");
        Ok(())
    }

    pub async fn get(&self, protocol: &str, account: &str) -> Option<Staff> {
        self.staffs
            .read()
            .await
            .get(&(protocol.to_owned(), account.to_owned()))
            .cloned()
    }

    /// Accounts registered for `protocol`.
    pub async fn accounts(&self, protocol: &str) -> Vec<String> {
        self.staffs
            .read()
            .await
            .keys()
            .filter(|(p, _)| p == protocol)
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.staffs.read().await.len()
    }
}

/// Composes the collectors a protocol lists, in order.
pub fn compose_protocol(protocol: &ProtocolConfig) -> RuntimeResult<Composition> {
    let compose_error = |source| RuntimeError::Compose {
        protocol: protocol.name.clone(),
        source,
    };

    let mut artifacts = Vec::new();
    for subset in &protocol.collectors {
        let found =
            compose_subset(&subset.namespace, subset.identify.as_deref()).map_err(compose_error)?;
        debug!(protocol = %protocol.name, subset = %subset, collectors = found.len(), "Selected collectors");
        artifacts.extend(found);
    }
    compose(artifacts).map_err(compose_error)
}
