//! Process-wide connector registry.
//!
//! Built once at startup, read-only afterwards: every registration happens
//! before the first statement executes, so lookups during job execution
//! never contend with writers.

pub mod descriptor;
pub mod error;

pub use descriptor::{ConnectorDescriptor, SinkRole, SourceRole};
pub use error::RegistryError;

use common::traits::{ConnectorError, DataTunnelSink, DataTunnelSource};
use common::types::ResolvedOptions;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Factory for connector handles. Implementations are registered under the
/// descriptor's name and must be cheap to call: expensive work belongs in
/// the opened handle, not the provider.
pub trait ConnectorProvider: Send + Sync + 'static {
    fn descriptor(&self) -> ConnectorDescriptor;

    fn open_source(
        &self,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSource>, ConnectorError> {
        let _ = options;
        Err(ConnectorError::permanent_msg(format!(
            "connector '{}' cannot act as a source",
            self.descriptor().name()
        )))
    }

    fn open_sink(
        &self,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSink>, ConnectorError> {
        let _ = options;
        Err(ConnectorError::permanent_msg(format!(
            "connector '{}' cannot act as a sink",
            self.descriptor().name()
        )))
    }
}

struct Entry {
    descriptor: ConnectorDescriptor,
    provider: Arc<dyn ConnectorProvider>,
}

#[derive(Default)]
struct State {
    connectors: HashMap<String, Entry>,
}

/// Name-to-provider map. Connector names are case-insensitive.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    inner: Arc<RwLock<State>>,
}

static GLOBAL: Lazy<ConnectorRegistry> = Lazy::new(ConnectorRegistry::new);

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process registry. Tests build their own instances.
    pub fn global() -> &'static ConnectorRegistry {
        &GLOBAL
    }

    /// Register a provider under its descriptor's name. A second
    /// registration under the same name is a configuration error, never a
    /// silent overwrite.
    pub fn register(&self, provider: Arc<dyn ConnectorProvider>) -> Result<(), RegistryError> {
        let descriptor = provider.descriptor();
        let key = descriptor.name().to_lowercase();
        let mut state = self.inner.write();
        if state.connectors.contains_key(&key) {
            return Err(RegistryError::duplicate(format!(
                "connector '{}' is already registered",
                descriptor.name()
            )));
        }
        debug!(connector = %descriptor.name(), "registered connector");
        state.connectors.insert(
            key,
            Entry {
                descriptor,
                provider,
            },
        );
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<ConnectorDescriptor, RegistryError> {
        let state = self.inner.read();
        state
            .connectors
            .get(&name.to_lowercase())
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| RegistryError::unknown_connector(format!("'{name}' is not registered")))
    }

    pub fn create_source(
        &self,
        name: &str,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSource>, RegistryError> {
        let provider = self.role_checked_provider(name, Role::Source)?;
        provider.open_source(options).map_err(RegistryError::open)
    }

    pub fn create_sink(
        &self,
        name: &str,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSink>, RegistryError> {
        let provider = self.role_checked_provider(name, Role::Sink)?;
        provider.open_sink(options).map_err(RegistryError::open)
    }

    pub fn connector_names(&self) -> Vec<String> {
        let state = self.inner.read();
        let mut names: Vec<String> = state
            .connectors
            .values()
            .map(|entry| entry.descriptor.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn role_checked_provider(
        &self,
        name: &str,
        role: Role,
    ) -> Result<Arc<dyn ConnectorProvider>, RegistryError> {
        let state = self.inner.read();
        let entry = state
            .connectors
            .get(&name.to_lowercase())
            .ok_or_else(|| RegistryError::unknown_connector(format!("'{name}' is not registered")))?;
        let supported = match role {
            Role::Source => entry.descriptor.can_read(),
            Role::Sink => entry.descriptor.can_write(),
        };
        if !supported {
            return Err(RegistryError::unsupported_capability(format!(
                "connector '{}' cannot act as a {}",
                entry.descriptor.name(),
                role
            )));
        }
        Ok(Arc::clone(&entry.provider))
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Source,
    Sink,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Source => write!(f, "source"),
            Role::Sink => write!(f, "sink"),
        }
    }
}
