//! Shared fixtures for the workspace test suites: schema-resolved option
//! maps, hand-built transfer units, and misbehaving connectors for retry
//! and cancellation coverage.

use async_trait::async_trait;
use common::traits::{ConnectorError, DataTunnelSource, RowBatchReader};
use common::types::{
    keys, ConcreteEntity, OptionMap, OptionSchema, OptionValue, Projection, ResolvedOptions,
    RowBatch, TransferUnit, WriteMode,
};
use connectors::{MemoryConnectorProvider, MemoryStore};
use registry::{ConnectorDescriptor, ConnectorProvider};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Resolve literal pairs against a schema, panicking on any issue. Test-only
/// convenience; production code always goes through the analyzer.
pub fn resolved(schema: &OptionSchema, pairs: &[(&str, OptionValue)]) -> ResolvedOptions {
    let (map, dups) = OptionMap::from_pairs(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Vec<_>>(),
    );
    assert!(dups.is_empty(), "duplicate fixture options: {dups:?}");
    schema
        .resolve(&map)
        .unwrap_or_else(|issues| panic!("fixture options invalid: {issues:?}"))
}

fn entity_pairs(entity: &ConcreteEntity) -> Vec<(&'static str, OptionValue)> {
    vec![
        (keys::SCHEMA_NAME, OptionValue::String(entity.schema.clone())),
        (keys::TABLE_NAME, OptionValue::String(entity.table.clone())),
    ]
}

/// A wildcard-projection unit between two connectors, with options derived
/// from the entities.
pub fn wildcard_unit(
    source_connector: &str,
    sink_connector: &str,
    source_entity: ConcreteEntity,
    sink_entity: ConcreteEntity,
    write_mode: WriteMode,
    upsert_keys: Vec<String>,
) -> TransferUnit {
    let source_options = resolved(&OptionSchema::source_base(), &entity_pairs(&source_entity));
    let sink_options = resolved(&OptionSchema::sink_base(), &entity_pairs(&sink_entity));
    TransferUnit {
        source_connector: source_connector.to_string(),
        sink_connector: sink_connector.to_string(),
        source_options,
        sink_options,
        source_entity,
        sink_entity,
        projection: Projection::Wildcard,
        row_filter: None,
        write_mode,
        upsert_keys,
    }
}

/// Memory-backed source connector that fails `read_batches` on one entity
/// with an explicit transient error a fixed number of times, then behaves.
pub struct FlakySourceProvider {
    name: String,
    delegate: MemoryConnectorProvider,
    fail_entity: ConcreteEntity,
    remaining_failures: Arc<AtomicU32>,
}

impl FlakySourceProvider {
    pub fn new(
        name: impl Into<String>,
        store: MemoryStore,
        fail_entity: ConcreteEntity,
        failures: u32,
    ) -> Self {
        let name = name.into();
        Self {
            delegate: MemoryConnectorProvider::with_store(name.clone(), store),
            name,
            fail_entity,
            remaining_failures: Arc::new(AtomicU32::new(failures)),
        }
    }
}

impl ConnectorProvider for FlakySourceProvider {
    fn descriptor(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(self.name.clone()).readable(OptionSchema::source_base())
    }

    fn open_source(
        &self,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSource>, ConnectorError> {
        let inner = self.delegate.open_source(options)?;
        Ok(Box::new(FlakySource {
            inner,
            fail_entity: self.fail_entity.clone(),
            remaining_failures: Arc::clone(&self.remaining_failures),
        }))
    }
}

struct FlakySource {
    inner: Box<dyn DataTunnelSource>,
    fail_entity: ConcreteEntity,
    remaining_failures: Arc<AtomicU32>,
}

#[async_trait]
impl DataTunnelSource for FlakySource {
    async fn list_entities(
        &mut self,
        schema_pattern: &str,
        table_pattern: &str,
    ) -> Result<Vec<ConcreteEntity>, ConnectorError> {
        self.inner.list_entities(schema_pattern, table_pattern).await
    }

    async fn read_batches(
        &mut self,
        entity: &ConcreteEntity,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<Box<dyn RowBatchReader>, ConnectorError> {
        if *entity == self.fail_entity && self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectorError::transient_msg(format!(
                "injected transient failure reading {entity}"
            )));
        }
        self.inner.read_batches(entity, columns, filter).await
    }
}

/// Source connector whose read stream never yields: the unit stays in
/// flight until cancelled. Used by cancellation tests.
pub struct BlockingSourceProvider {
    name: String,
}

impl BlockingSourceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ConnectorProvider for BlockingSourceProvider {
    fn descriptor(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(self.name.clone()).readable(OptionSchema::source_base())
    }

    fn open_source(
        &self,
        _options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSource>, ConnectorError> {
        Ok(Box::new(BlockingSource))
    }
}

struct BlockingSource;

#[async_trait]
impl DataTunnelSource for BlockingSource {
    async fn list_entities(
        &mut self,
        _schema_pattern: &str,
        _table_pattern: &str,
    ) -> Result<Vec<ConcreteEntity>, ConnectorError> {
        Ok(Vec::new())
    }

    async fn read_batches(
        &mut self,
        _entity: &ConcreteEntity,
        _columns: &[String],
        _filter: Option<&str>,
    ) -> Result<Box<dyn RowBatchReader>, ConnectorError> {
        Ok(Box::new(NeverReader))
    }
}

struct NeverReader;

#[async_trait]
impl RowBatchReader for NeverReader {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>, ConnectorError> {
        std::future::pending::<()>().await;
        unreachable!("pending future resolved")
    }
}
