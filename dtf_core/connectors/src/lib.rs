//! Built-in connectors.
//!
//! `memory` is a catalog-backed read/write connector used by the demo
//! harnesses and the test suites; `log` is a write-only sink that renders
//! rows to the process log. Connectors for concrete external systems plug
//! in through the same provider registration.

pub mod log;
pub mod memory;

pub use crate::log::LogConnectorProvider;
pub use memory::{MemoryConnectorProvider, MemoryStore};

use registry::{ConnectorRegistry, RegistryError};
use std::sync::Arc;

/// Register the built-in connectors. Called once at process start, before
/// any statement is accepted.
pub fn register_builtins(registry: &ConnectorRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(MemoryConnectorProvider::shared()))?;
    registry.register(Arc::new(LogConnectorProvider::new()))?;
    Ok(())
}
