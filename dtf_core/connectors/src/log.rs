//! Log sink connector.
//!
//! Write-only demo sink: rows are rendered into the process log instead of
//! being stored. Useful as the SINK of a smoke-test statement while wiring
//! up a new source.

use async_trait::async_trait;
use common::traits::{ConnectorError, DataTunnelSink};
use common::types::{
    keys, ConcreteEntity, OptionKind, OptionSchema, OptionValue, ResolvedOptions, RowBatch,
    WriteMode,
};
use registry::{ConnectorDescriptor, ConnectorProvider};
use tracing::{info, warn};

pub const MAX_ROWS_KEY: &str = "maxRows";
const DEFAULT_MAX_ROWS: i64 = 20;

pub struct LogConnectorProvider;

impl LogConnectorProvider {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl ConnectorProvider for LogConnectorProvider {
    fn descriptor(&self) -> ConnectorDescriptor {
        // The log has no addressable entities, so the usual required
        // schema/table keys fall back to fixed defaults here.
        let sink_options = OptionSchema::sink_base()
            .optional_with_default(
                keys::SCHEMA_NAME,
                OptionKind::String,
                OptionValue::String("log".to_string()),
            )
            .optional_with_default(
                keys::TABLE_NAME,
                OptionKind::String,
                OptionValue::String("output".to_string()),
            )
            .optional_with_default(
                MAX_ROWS_KEY,
                OptionKind::Integer,
                OptionValue::Integer(DEFAULT_MAX_ROWS),
            );
        ConnectorDescriptor::new("log")
            .writable(sink_options, vec![WriteMode::Append, WriteMode::Overwrite])
    }

    fn open_sink(
        &self,
        options: &ResolvedOptions,
    ) -> Result<Box<dyn DataTunnelSink>, ConnectorError> {
        let max_rows = options.get_i64(MAX_ROWS_KEY).unwrap_or(DEFAULT_MAX_ROWS);
        Ok(Box::new(LogSink {
            entity: None,
            max_rows: max_rows.max(0) as u64,
            rows_seen: 0,
        }))
    }
}

struct LogSink {
    entity: Option<ConcreteEntity>,
    max_rows: u64,
    rows_seen: u64,
}

impl LogSink {
    fn target(&self) -> String {
        self.entity
            .as_ref()
            .map_or_else(|| "<unprepared>".to_string(), ConcreteEntity::to_string)
    }
}

#[async_trait]
impl DataTunnelSink for LogSink {
    async fn prepare(
        &mut self,
        entity: &ConcreteEntity,
        mode: WriteMode,
        _upsert_keys: &[String],
    ) -> Result<(), ConnectorError> {
        self.entity = Some(entity.clone());
        info!(target: "datatunnel::log_sink", "{} opened ({mode})", entity);
        Ok(())
    }

    async fn write_batch(&mut self, batch: RowBatch) -> Result<u64, ConnectorError> {
        if self.entity.is_none() {
            return Err(ConnectorError::permanent_msg("sink used before prepare"));
        }

        let target = self.target();
        for row in &batch.rows {
            if self.rows_seen < self.max_rows {
                let rendered = batch
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, cell)| format!("{col}={cell}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(target: "datatunnel::log_sink", "{target}: {rendered}");
            }
            self.rows_seen += 1;
        }
        Ok(batch.len() as u64)
    }

    async fn commit(&mut self) -> Result<(), ConnectorError> {
        info!(
            target: "datatunnel::log_sink",
            "{} done, {} rows ({} logged)",
            self.target(),
            self.rows_seen,
            self.rows_seen.min(self.max_rows)
        );
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), ConnectorError> {
        warn!(target: "datatunnel::log_sink", "{} aborted", self.target());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::Cell;

    #[tokio::test]
    async fn counts_all_rows_past_the_log_cap() {
        let mut sink = LogSink {
            entity: None,
            max_rows: 1,
            rows_seen: 0,
        };
        sink.prepare(
            &ConcreteEntity::new("log", "output"),
            WriteMode::Append,
            &[],
        )
        .await
        .unwrap();

        let written = sink
            .write_batch(RowBatch::new(
                vec!["id".into()],
                vec![
                    vec![Cell::Integer(1)],
                    vec![Cell::Integer(2)],
                    vec![Cell::Integer(3)],
                ],
            ))
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(sink.rows_seen, 3);
        sink.commit().await.unwrap();
    }

    #[tokio::test]
    async fn writing_before_prepare_fails() {
        let mut sink = LogSink {
            entity: None,
            max_rows: 5,
            rows_seen: 0,
        };
        let err = sink
            .write_batch(RowBatch::new(vec!["id".into()], vec![]))
            .await
            .expect_err("expected error");
        assert!(matches!(err, ConnectorError::Permanent { .. }));
    }
}
