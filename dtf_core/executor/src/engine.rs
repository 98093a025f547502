//! Transfer engine.
//!
//! Units run on a bounded worker pool. Inside a unit, a reader task fills a
//! bounded batch queue and the unit worker drains it into the sink, so
//! memory use is capped by queue depth times batch size and backpressure
//! falls out of channel capacity. Unit failures stay unit-scoped unless
//! fail-fast is configured.

use crate::cancel::{CancelSignal, CancelWatcher};
use crate::error::UnitError;
use chrono::Utc;
use common::config::EngineSettings;
use common::traits::{ConnectorError, DataTunnelSink};
use common::types::{
    Cell, ColumnRef, JobReport, LogicalTransferPlan, Projection, RowBatch, TransferUnit,
    TransferUnitResult, UnitFailure, UnitPhase, UnitSummary, WriteMode,
};
use registry::{ConnectorRegistry, RegistryError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct TransferEngine {
    registry: ConnectorRegistry,
    settings: EngineSettings,
}

impl TransferEngine {
    pub fn new(registry: ConnectorRegistry) -> Self {
        Self::with_settings(registry, EngineSettings::default())
    }

    pub fn with_settings(registry: ConnectorRegistry, settings: EngineSettings) -> Self {
        Self { registry, settings }
    }

    pub async fn execute(&self, plan: LogicalTransferPlan) -> JobReport {
        self.execute_with_cancel(plan, CancelSignal::new().watcher())
            .await
    }

    /// Run every unit to a terminal status and report. The cancel watcher
    /// aborts in-flight units (FAILED, cancelled) and skips unstarted ones.
    pub async fn execute_with_cancel(
        &self,
        plan: LogicalTransferPlan,
        cancel: CancelWatcher,
    ) -> JobReport {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%job_id, units = plan.len(), "transfer job started");

        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_units.max(1)));
        let abort = Arc::new(AtomicBool::new(false));

        let summaries: Vec<UnitSummary> = plan
            .units
            .iter()
            .map(|unit| UnitSummary {
                source: unit.source_entity.clone(),
                sink: unit.sink_entity.clone(),
                write_mode: unit.write_mode,
            })
            .collect();

        // Units are launched in plan order, each behind a pool permit taken
        // here. A fail-fast or cancellation observed before launch skips the
        // unit; anything already launched settles its own status.
        let mut handles = Vec::with_capacity(plan.len());
        for (unit, summary) in plan.units.into_iter().zip(summaries.iter().cloned()) {
            if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                handles.push(None);
                continue;
            }
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    handles.push(None);
                    continue;
                }
            };
            if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                handles.push(None);
                continue;
            }
            let worker = UnitWorker {
                registry: self.registry.clone(),
                settings: self.settings.clone(),
                unit,
                summary,
                cancel: cancel.clone(),
                abort: Arc::clone(&abort),
            };
            handles.push(Some(tokio::spawn(async move {
                let _permit = permit;
                worker.run_with_retries().await
            })));
        }

        let mut units = Vec::with_capacity(handles.len());
        for (summary, handle) in summaries.into_iter().zip(handles) {
            let result = match handle {
                None => TransferUnitResult::skipped(summary),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(join_err) => TransferUnitResult::failed(
                        summary,
                        0,
                        0,
                        UnitFailure::new(
                            UnitPhase::Open,
                            format!("unit worker crashed: {join_err}"),
                        ),
                    ),
                },
            };
            units.push(result);
        }

        let report = JobReport {
            job_id,
            started_at,
            finished_at: Utc::now(),
            units,
        };
        let (succeeded, failed, skipped) = report.counts();
        info!(%job_id, succeeded, failed, skipped, "transfer job finished");
        report
    }
}

struct AttemptOutcome {
    rows_read: u64,
    rows_written: u64,
    result: Result<(), UnitError>,
}

impl AttemptOutcome {
    fn ok(rows_read: u64, rows_written: u64) -> Self {
        Self {
            rows_read,
            rows_written,
            result: Ok(()),
        }
    }

    fn failed(error: UnitError, rows_read: u64, rows_written: u64) -> Self {
        Self {
            rows_read,
            rows_written,
            result: Err(error),
        }
    }
}

struct UnitWorker {
    registry: ConnectorRegistry,
    settings: EngineSettings,
    unit: TransferUnit,
    summary: UnitSummary,
    cancel: CancelWatcher,
    abort: Arc<AtomicBool>,
}

impl UnitWorker {
    async fn run_with_retries(mut self) -> TransferUnitResult {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.run_once().await;
            match outcome.result {
                Ok(()) => {
                    info!(
                        unit = %self.summary,
                        rows_read = outcome.rows_read,
                        rows_written = outcome.rows_written,
                        "unit succeeded"
                    );
                    return TransferUnitResult::succeeded(
                        self.summary,
                        outcome.rows_read,
                        outcome.rows_written,
                    );
                }
                Err(err)
                    if err.is_transient()
                        && !err.is_cancelled()
                        && attempt < self.settings.retry_attempts
                        && !self.cancel.is_cancelled() =>
                {
                    attempt += 1;
                    let backoff =
                        Duration::from_millis(self.settings.retry_backoff_ms * u64::from(attempt));
                    warn!(
                        unit = %self.summary,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient failure, retrying: {err}"
                    );
                    let mut cancel = self.cancel.clone();
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return TransferUnitResult::failed(
                                self.summary,
                                outcome.rows_read,
                                outcome.rows_written,
                                err.into_failure(),
                            );
                        }
                        _ = sleep(backoff) => {}
                    }
                }
                Err(err) => {
                    warn!(unit = %self.summary, "unit failed: {err}");
                    if self.settings.fail_fast {
                        self.abort.store(true, Ordering::SeqCst);
                    }
                    return TransferUnitResult::failed(
                        self.summary,
                        outcome.rows_read,
                        outcome.rows_written,
                        err.into_failure(),
                    );
                }
            }
        }
    }

    async fn run_once(&mut self) -> AttemptOutcome {
        let unit = &self.unit;
        let mut cancel = self.cancel.clone();
        let mut rows_read: u64 = 0;
        let mut rows_written: u64 = 0;

        let mut source = match self
            .registry
            .create_source(&unit.source_connector, &unit.source_options)
        {
            Ok(source) => source,
            Err(err) => {
                return AttemptOutcome::failed(UnitError::new(UnitPhase::Open, open_error(err)), 0, 0)
            }
        };
        let mut sink = match self
            .registry
            .create_sink(&unit.sink_connector, &unit.sink_options)
        {
            Ok(sink) => sink,
            Err(err) => {
                return AttemptOutcome::failed(UnitError::new(UnitPhase::Open, open_error(err)), 0, 0)
            }
        };

        if let Err(err) = sink
            .prepare(&unit.sink_entity, unit.write_mode, &unit.upsert_keys)
            .await
        {
            return AttemptOutcome::failed(UnitError::new(UnitPhase::Prepare, err), 0, 0);
        }

        let read_columns = unit.projection.read_columns();
        let reader = tokio::select! {
            _ = cancel.cancelled() => {
                abort_sink(&mut sink).await;
                return AttemptOutcome::failed(UnitError::cancelled(UnitPhase::Read), 0, 0);
            }
            opened = source.read_batches(
                &unit.source_entity,
                &read_columns,
                unit.row_filter.as_deref(),
            ) => match opened {
                Ok(reader) => reader,
                Err(err) => {
                    abort_sink(&mut sink).await;
                    return AttemptOutcome::failed(UnitError::new(UnitPhase::Read, err), 0, 0);
                }
            }
        };

        // reader task feeds a bounded queue; capacity gives backpressure
        let depth = self.settings.batch_queue_depth.max(1);
        let (tx, mut rx) = mpsc::channel::<Result<RowBatch, ConnectorError>>(depth);
        let mut reader_cancel = self.cancel.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = reader;
            loop {
                let next = tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    next = reader.next_batch() => next,
                };
                match next {
                    Ok(Some(batch)) => {
                        let sent = tokio::select! {
                            _ = reader_cancel.cancelled() => break,
                            sent = tx.send(Ok(batch)) => sent,
                        };
                        if sent.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        break;
                    }
                }
            }
        });

        let mut upsert_keys_checked = false;
        let failure = loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break Some(UnitError::cancelled(UnitPhase::Write)),
                next = rx.recv() => next,
            };
            match next {
                None => break None,
                Some(Err(err)) => break Some(UnitError::new(UnitPhase::Read, err)),
                Some(Ok(batch)) => {
                    rows_read += batch.len() as u64;
                    let out = match remap_batch(batch, unit) {
                        Ok(out) => out,
                        Err(err) => break Some(UnitError::new(UnitPhase::Write, err)),
                    };
                    if !upsert_keys_checked {
                        upsert_keys_checked = true;
                        if unit.write_mode == WriteMode::Upsert {
                            if let Some(missing) = unit
                                .upsert_keys
                                .iter()
                                .find(|key| !out.columns.contains(key))
                            {
                                break Some(UnitError::new(
                                    UnitPhase::Write,
                                    ConnectorError::schema_mismatch(format!(
                                        "upsert key '{missing}' is not part of the written columns {:?}",
                                        out.columns
                                    )),
                                ));
                            }
                        }
                    }
                    let written = tokio::select! {
                        _ = cancel.cancelled() => break Some(UnitError::cancelled(UnitPhase::Write)),
                        written = sink.write_batch(out) => written,
                    };
                    match written {
                        Ok(count) => rows_written += count,
                        Err(err) => break Some(UnitError::new(UnitPhase::Write, err)),
                    }
                }
            }
        };
        reader_handle.abort();

        match failure {
            None => {
                let committed = tokio::select! {
                    _ = cancel.cancelled() => Err(UnitError::cancelled(UnitPhase::Commit)),
                    committed = sink.commit() => {
                        committed.map_err(|err| UnitError::new(UnitPhase::Commit, err))
                    }
                };
                match committed {
                    Ok(()) => AttemptOutcome::ok(rows_read, rows_written),
                    Err(err) => {
                        abort_sink(&mut sink).await;
                        AttemptOutcome::failed(err, rows_read, rows_written)
                    }
                }
            }
            Some(err) => {
                abort_sink(&mut sink).await;
                AttemptOutcome::failed(err, rows_read, rows_written)
            }
        }
    }
}

fn open_error(err: RegistryError) -> ConnectorError {
    match err {
        RegistryError::Open { source } => source,
        other => ConnectorError::permanent_msg(other.to_string()),
    }
}

async fn abort_sink(sink: &mut Box<dyn DataTunnelSink>) {
    if let Err(err) = sink.abort().await {
        warn!("sink abort failed: {err}");
    }
}

/// Apply the unit's column mapping to one batch: rename data columns and
/// fill provenance positions with the source entity's qualified name.
fn remap_batch(batch: RowBatch, unit: &TransferUnit) -> Result<RowBatch, ConnectorError> {
    let mappings = match &unit.projection {
        Projection::Wildcard => return Ok(batch),
        Projection::Columns(mappings) => mappings,
    };

    let mut indexes = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        match &mapping.source {
            ColumnRef::SourceEntityName => indexes.push(None),
            ColumnRef::Column(name) => {
                let idx = batch.column_index(name).ok_or_else(|| {
                    ConnectorError::schema_mismatch(format!(
                        "source batch for {} is missing column '{name}'",
                        unit.source_entity
                    ))
                })?;
                indexes.push(Some(idx));
            }
        }
    }

    let columns = mappings.iter().map(|m| m.sink_name.clone()).collect();
    let provenance = Cell::String(unit.source_entity.qualified_name());
    let rows = batch
        .rows
        .into_iter()
        .map(|row| {
            indexes
                .iter()
                .map(|idx| match idx {
                    Some(i) => row[*i].clone(),
                    None => provenance.clone(),
                })
                .collect()
        })
        .collect();

    Ok(RowBatch { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ConcreteEntity;
    use connectors::{MemoryConnectorProvider, MemoryStore};
    use pretty_assertions::assert_eq;
    use test_utils::{wildcard_unit, BlockingSourceProvider, FlakySourceProvider};

    use common::types::UnitStatus;

    fn seeded_store(tables: &[(&str, &str, i64)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (schema, table, rows) in tables {
            let rows = (0..*rows)
                .map(|i| vec![Cell::Integer(i), Cell::String(format!("row{i}"))])
                .collect();
            store.seed(ConcreteEntity::new(*schema, *table), vec!["id", "name"], rows);
        }
        store
    }

    fn settings(max_parallel: usize) -> EngineSettings {
        EngineSettings {
            max_parallel_units: max_parallel,
            batch_queue_depth: 2,
            retry_attempts: 2,
            retry_backoff_ms: 1,
            fail_fast: false,
        }
    }

    fn three_unit_plan(source_connector: &str, sink_connector: &str) -> LogicalTransferPlan {
        let units = ["t1", "t2", "t3"]
            .iter()
            .map(|table| {
                wildcard_unit(
                    source_connector,
                    sink_connector,
                    ConcreteEntity::new("src", *table),
                    ConcreteEntity::new("dst", *table),
                    WriteMode::Append,
                    vec![],
                )
            })
            .collect();
        LogicalTransferPlan::new(units)
    }

    #[tokio::test]
    async fn copies_rows_between_memory_connectors() {
        let source_store = seeded_store(&[("src", "t1", 5)]);
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "src_mem",
                source_store,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store.clone(),
            )))
            .unwrap();

        let plan = LogicalTransferPlan::new(vec![wildcard_unit(
            "src_mem",
            "dst_mem",
            ConcreteEntity::new("src", "t1"),
            ConcreteEntity::new("dst", "t1"),
            WriteMode::Append,
            vec![],
        )]);

        let report = TransferEngine::with_settings(registry, settings(2))
            .execute(plan)
            .await;

        assert!(report.succeeded());
        assert_eq!(report.units[0].rows_read, 5);
        assert_eq!(report.units[0].rows_written, 5);
        assert_eq!(sink_store.row_count(&ConcreteEntity::new("dst", "t1")), 5);
    }

    #[tokio::test]
    async fn transient_failure_within_budget_retries_to_success() {
        let store = seeded_store(&[("src", "t1", 2), ("src", "t2", 2), ("src", "t3", 2)]);
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(FlakySourceProvider::new(
                "flaky",
                store,
                ConcreteEntity::new("src", "t2"),
                2,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store,
            )))
            .unwrap();

        let report = TransferEngine::with_settings(registry, settings(2))
            .execute(three_unit_plan("flaky", "dst_mem"))
            .await;

        assert!(report.succeeded(), "report: {report:?}");
        let (succeeded, failed, skipped) = report.counts();
        assert_eq!((succeeded, failed, skipped), (3, 0, 0));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_only_the_affected_unit() {
        let store = seeded_store(&[("src", "t1", 2), ("src", "t2", 2), ("src", "t3", 2)]);
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        // three failures against a budget of two retries
        registry
            .register(Arc::new(FlakySourceProvider::new(
                "flaky",
                store,
                ConcreteEntity::new("src", "t2"),
                3,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store,
            )))
            .unwrap();

        let report = TransferEngine::with_settings(registry, settings(1))
            .execute(three_unit_plan("flaky", "dst_mem"))
            .await;

        assert!(!report.succeeded());
        assert_eq!(report.units[0].status, UnitStatus::Succeeded);
        assert_eq!(report.units[1].status, UnitStatus::Failed);
        assert_eq!(report.units[2].status, UnitStatus::Succeeded);
        let failure = report.units[1].error.as_ref().expect("failure detail");
        assert_eq!(failure.phase, UnitPhase::Read);
        assert!(!failure.cancelled);
    }

    #[tokio::test]
    async fn fail_fast_skips_units_that_have_not_started() {
        let store = seeded_store(&[("src", "t1", 2), ("src", "t3", 2)]); // t2 missing
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "src_mem", store,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store,
            )))
            .unwrap();

        let mut config = settings(1);
        config.fail_fast = true;
        let units = ["t2", "t1", "t3"]
            .iter()
            .map(|table| {
                wildcard_unit(
                    "src_mem",
                    "dst_mem",
                    ConcreteEntity::new("src", *table),
                    ConcreteEntity::new("dst", *table),
                    WriteMode::Append,
                    vec![],
                )
            })
            .collect();

        let report = TransferEngine::with_settings(registry, config)
            .execute(LogicalTransferPlan::new(units))
            .await;

        assert_eq!(report.units[0].status, UnitStatus::Failed);
        assert_eq!(report.units[1].status, UnitStatus::Skipped);
        assert_eq!(report.units[2].status, UnitStatus::Skipped);
    }

    #[tokio::test]
    async fn cancellation_fails_in_flight_units_and_skips_the_rest() {
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(BlockingSourceProvider::new("stuck")))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store,
            )))
            .unwrap();

        let engine = TransferEngine::with_settings(registry, settings(1));
        let signal = CancelSignal::new();
        let watcher = signal.watcher();
        let plan = three_unit_plan("stuck", "dst_mem");

        let job = tokio::spawn({
            let engine = engine.clone();
            async move { engine.execute_with_cancel(plan, watcher).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.cancel();
        let report = job.await.expect("job crashed");

        assert_eq!(report.units[0].status, UnitStatus::Failed);
        let failure = report.units[0].error.as_ref().expect("failure detail");
        assert!(failure.cancelled);
        assert_eq!(report.units[1].status, UnitStatus::Skipped);
        assert_eq!(report.units[2].status, UnitStatus::Skipped);
    }

    #[tokio::test]
    async fn upsert_key_outside_written_columns_is_a_schema_mismatch() {
        let store = seeded_store(&[("src", "t1", 2)]);
        let sink_store = MemoryStore::new();
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "src_mem", store,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store,
            )))
            .unwrap();

        let plan = LogicalTransferPlan::new(vec![wildcard_unit(
            "src_mem",
            "dst_mem",
            ConcreteEntity::new("src", "t1"),
            ConcreteEntity::new("dst", "t1"),
            WriteMode::Upsert,
            vec!["missing_key".to_string()],
        )]);

        let report = TransferEngine::with_settings(registry, settings(1))
            .execute(plan)
            .await;

        assert_eq!(report.units[0].status, UnitStatus::Failed);
        let failure = report.units[0].error.as_ref().expect("failure detail");
        assert_eq!(failure.phase, UnitPhase::Write);
        assert!(failure.message.contains("missing_key"), "{failure:?}");
    }

    #[tokio::test]
    async fn overwrite_clears_prior_sink_contents() {
        let source_store = seeded_store(&[("src", "t1", 1)]);
        let sink_store = seeded_store(&[("dst", "t1", 7)]);
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "src_mem",
                source_store,
            )))
            .unwrap();
        registry
            .register(Arc::new(MemoryConnectorProvider::with_store(
                "dst_mem",
                sink_store.clone(),
            )))
            .unwrap();

        let plan = LogicalTransferPlan::new(vec![wildcard_unit(
            "src_mem",
            "dst_mem",
            ConcreteEntity::new("src", "t1"),
            ConcreteEntity::new("dst", "t1"),
            WriteMode::Overwrite,
            vec![],
        )]);

        let report = TransferEngine::with_settings(registry, settings(1))
            .execute(plan)
            .await;

        assert!(report.succeeded());
        assert_eq!(sink_store.row_count(&ConcreteEntity::new("dst", "t1")), 1);
    }
}
