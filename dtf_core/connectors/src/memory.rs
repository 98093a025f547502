//! In-process memory connector.
//!
//! Tables live in a shared [`MemoryStore`]; the connector exposes them as a
//! catalog for pattern expansion and as read/write entities. Sinks stage
//! their batches and apply them on `commit`, so an aborted unit leaves the
//! store untouched.

use async_trait::async_trait;
use common::traits::{ConnectorError, DataTunnelSink, DataTunnelSource, RowBatchReader};
use common::types::{
    Cell, ConcreteEntity, NameMatcher, OptionKind, OptionSchema, OptionValue, ResolvedOptions,
    RowBatch, WriteMode,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use registry::{ConnectorDescriptor, ConnectorProvider};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

pub const BATCH_SIZE_KEY: &str = "batchSize";
const DEFAULT_BATCH_SIZE: i64 = 1024;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Default)]
struct StoreState {
    // BTreeMap keeps catalog enumeration deterministic across runs.
    tables: BTreeMap<ConcreteEntity, MemoryTable>,
}

/// Shared table store backing one memory connector.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a table with the given layout and rows.
    pub fn seed(&self, entity: ConcreteEntity, columns: Vec<&str>, rows: Vec<Vec<Cell>>) {
        let table = MemoryTable {
            columns: columns.into_iter().map(str::to_string).collect(),
            rows,
        };
        self.inner.write().tables.insert(entity, table);
    }

    pub fn table(&self, entity: &ConcreteEntity) -> Option<MemoryTable> {
        self.inner.read().tables.get(entity).cloned()
    }

    pub fn entities(&self) -> Vec<ConcreteEntity> {
        self.inner.read().tables.keys().cloned().collect()
    }

    pub fn row_count(&self, entity: &ConcreteEntity) -> usize {
        self.inner
            .read()
            .tables
            .get(entity)
            .map_or(0, |t| t.rows.len())
    }
}

/// Provider for the memory connector. `shared()` hands out the process-wide
/// store; `with_store` binds an arbitrary name to a private store, which the
/// test suites use to stand in for external systems.
pub struct MemoryConnectorProvider {
    name: String,
    store: MemoryStore,
}

static SHARED_STORE: Lazy<MemoryStore> = Lazy::new(MemoryStore::new);

impl MemoryConnectorProvider {
    pub fn shared() -> Self {
        Self::with_store("memory", SHARED_STORE.clone())
    }

    pub fn with_store(name: impl Into<String>, store: MemoryStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }
}

impl ConnectorProvider for MemoryConnectorProvider {
    fn descriptor(&self) -> ConnectorDescriptor {
        let source_options = OptionSchema::source_base().optional_with_default(
            BATCH_SIZE_KEY,
            OptionKind::Integer,
            OptionValue::Integer(DEFAULT_BATCH_SIZE),
        );
        ConnectorDescriptor::new(self.name.clone())
            .readable(source_options)
            .writable(
                OptionSchema::sink_base(),
                vec![WriteMode::Append, WriteMode::Overwrite, WriteMode::Upsert],
            )
    }

    fn open_source(
        &self,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSource>, ConnectorError> {
        let batch_size = options
            .get_i64(BATCH_SIZE_KEY)
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .max(1) as usize;
        Ok(Box::new(MemorySource {
            store: self.store.clone(),
            batch_size,
        }))
    }

    fn open_sink(
        &self,
        _options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSink>, ConnectorError> {
        Ok(Box::new(MemorySink {
            store: self.store.clone(),
            prepared: None,
            staged: Vec::new(),
        }))
    }
}

struct MemorySource {
    store: MemoryStore,
    batch_size: usize,
}

#[async_trait]
impl DataTunnelSource for MemorySource {
    async fn list_entities(
        &mut self,
        schema_pattern: &str,
        table_pattern: &str,
    ) -> Result<Vec<ConcreteEntity>, ConnectorError> {
        let schema_matcher = NameMatcher::compile(schema_pattern)
            .map_err(|e| ConnectorError::permanent_msg(format!("bad schema pattern: {e}")))?;
        let table_matcher = NameMatcher::compile(table_pattern)
            .map_err(|e| ConnectorError::permanent_msg(format!("bad table pattern: {e}")))?;

        Ok(self
            .store
            .entities()
            .into_iter()
            .filter(|e| schema_matcher.matches(&e.schema) && table_matcher.matches(&e.table))
            .collect())
    }

    async fn read_batches(
        &mut self,
        entity: &ConcreteEntity,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<Box<dyn RowBatchReader>, ConnectorError> {
        if let Some(condition) = filter {
            return Err(ConnectorError::permanent_msg(format!(
                "memory connector does not support row conditions (got '{condition}')"
            )));
        }

        let table = self.store.table(entity).ok_or_else(|| {
            ConnectorError::permanent_msg(format!("unknown entity {entity}"))
        })?;

        let (out_columns, indexes) = if columns.is_empty() {
            let indexes = (0..table.columns.len()).collect::<Vec<_>>();
            (table.columns.clone(), indexes)
        } else {
            let mut indexes = Vec::with_capacity(columns.len());
            for column in columns {
                let idx = table
                    .columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| {
                        ConnectorError::schema_mismatch(format!(
                            "entity {entity} has no column '{column}'"
                        ))
                    })?;
                indexes.push(idx);
            }
            (columns.to_vec(), indexes)
        };

        let batches = table
            .rows
            .chunks(self.batch_size)
            .map(|chunk| {
                let rows = chunk
                    .iter()
                    .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                    .collect();
                RowBatch::new(out_columns.clone(), rows)
            })
            .collect::<VecDeque<_>>();

        Ok(Box::new(MemoryBatchReader { batches }))
    }
}

struct MemoryBatchReader {
    batches: VecDeque<RowBatch>,
}

#[async_trait]
impl RowBatchReader for MemoryBatchReader {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>, ConnectorError> {
        Ok(self.batches.pop_front())
    }
}

struct Prepared {
    entity: ConcreteEntity,
    mode: WriteMode,
    upsert_keys: Vec<String>,
}

struct MemorySink {
    store: MemoryStore,
    prepared: Option<Prepared>,
    staged: Vec<RowBatch>,
}

#[async_trait]
impl DataTunnelSink for MemorySink {
    async fn prepare(
        &mut self,
        entity: &ConcreteEntity,
        mode: WriteMode,
        upsert_keys: &[String],
    ) -> Result<(), ConnectorError> {
        self.prepared = Some(Prepared {
            entity: entity.clone(),
            mode,
            upsert_keys: upsert_keys.to_vec(),
        });
        Ok(())
    }

    async fn write_batch(&mut self, batch: RowBatch) -> Result<u64, ConnectorError> {
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| ConnectorError::permanent_msg("sink used before prepare"))?;

        // Layout must agree with prior batches and, unless overwriting,
        // with the existing table.
        if let Some(first) = self.staged.first() {
            if first.columns != batch.columns {
                return Err(ConnectorError::schema_mismatch(format!(
                    "batch columns changed mid-stream for {}",
                    prepared.entity
                )));
            }
        } else if prepared.mode != WriteMode::Overwrite {
            if let Some(existing) = self.store.table(&prepared.entity) {
                if !existing.columns.is_empty() && existing.columns != batch.columns {
                    return Err(ConnectorError::schema_mismatch(format!(
                        "batch columns {:?} do not match entity {} columns {:?}",
                        batch.columns, prepared.entity, existing.columns
                    )));
                }
            }
        }

        let written = batch.len() as u64;
        self.staged.push(batch);
        Ok(written)
    }

    async fn commit(&mut self) -> Result<(), ConnectorError> {
        let prepared = self
            .prepared
            .take()
            .ok_or_else(|| ConnectorError::permanent_msg("sink used before prepare"))?;
        let staged = std::mem::take(&mut self.staged);

        let mut state = self.store.inner.write();
        let table = state.tables.entry(prepared.entity.clone()).or_default();

        if prepared.mode == WriteMode::Overwrite {
            table.columns.clear();
            table.rows.clear();
        }

        for batch in staged {
            if table.columns.is_empty() {
                table.columns = batch.columns.clone();
            }
            match prepared.mode {
                WriteMode::Append | WriteMode::Overwrite => table.rows.extend(batch.rows),
                WriteMode::Upsert => {
                    let key_indexes = prepared
                        .upsert_keys
                        .iter()
                        .map(|key| {
                            batch.column_index(key).ok_or_else(|| {
                                ConnectorError::schema_mismatch(format!(
                                    "upsert key '{key}' is not in the written columns"
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    for row in batch.rows {
                        let matches_keys = |existing: &Vec<Cell>| {
                            key_indexes
                                .iter()
                                .all(|&i| existing.get(i) == row.get(i))
                        };
                        if let Some(existing) =
                            table.rows.iter_mut().find(|r| matches_keys(r))
                        {
                            *existing = row;
                        } else {
                            table.rows.push(row);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn abort(&mut self) -> Result<(), ConnectorError> {
        self.prepared = None;
        self.staged.clear();
        Ok(())
    }
}
