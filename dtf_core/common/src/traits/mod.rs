//! Connector contract.
//!
//! A connector binds the engine to one external system and may act as a
//! source, a sink, or both. Handles are owned exclusively by one transfer
//! unit; nothing here is shared across units.

use crate::error::DiagnosticMessage;
use crate::types::entity::ConcreteEntity;
use crate::types::rows::RowBatch;
use crate::types::write_mode::WriteMode;
use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;

/// Failure at the connector boundary. `Transient` is an explicit signal
/// from the connector that the operation may succeed on retry; the engine
/// never infers retryability from any other variant.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("transient connector failure: {context}")]
    Transient {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("connector failure: {context}")]
    Permanent {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("schema mismatch: {context}")]
    SchemaMismatch { context: DiagnosticMessage },
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectorError {
    #[track_caller]
    pub fn transient<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = err.to_string();
        ConnectorError::Transient {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    #[track_caller]
    pub fn transient_msg(message: impl Into<String>) -> Self {
        ConnectorError::Transient {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn permanent<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = err.to_string();
        ConnectorError::Permanent {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }

    #[track_caller]
    pub fn permanent_msg(message: impl Into<String>) -> Self {
        ConnectorError::Permanent {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        ConnectorError::SchemaMismatch {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Transient { .. })
    }
}

/// Finite stream of row batches. Not restartable: once a batch has been
/// taken it will not be produced again.
#[async_trait]
pub trait RowBatchReader: Send {
    /// `Ok(None)` marks the end of the stream.
    async fn next_batch(&mut self) -> Result<Option<RowBatch>, ConnectorError>;
}

/// Read half of a connector.
#[async_trait]
pub trait DataTunnelSource: Send {
    /// Enumerate catalog entities matching the given schema/table patterns.
    /// Used once per statement, for pattern expansion; enumeration order is
    /// the plan order.
    async fn list_entities(
        &mut self,
        schema_pattern: &str,
        table_pattern: &str,
    ) -> Result<Vec<ConcreteEntity>, ConnectorError>;

    /// Open a projected, filtered read stream over one entity. An empty
    /// `columns` slice selects all columns.
    async fn read_batches(
        &mut self,
        entity: &ConcreteEntity,
        columns: &[String],
        filter: Option<&str>,
    ) -> Result<Box<dyn RowBatchReader>, ConnectorError>;
}

/// Write half of a connector.
#[async_trait]
pub trait DataTunnelSink: Send {
    /// Acquire the target entity for writing. OVERWRITE clears prior
    /// contents here, before any batch is written.
    async fn prepare(
        &mut self,
        entity: &ConcreteEntity,
        mode: WriteMode,
        upsert_keys: &[String],
    ) -> Result<(), ConnectorError>;

    /// Apply one batch under the prepared write mode. Returns rows written.
    async fn write_batch(&mut self, batch: RowBatch) -> Result<u64, ConnectorError>;

    async fn commit(&mut self) -> Result<(), ConnectorError>;

    /// Release the target without committing. Best effort; errors are
    /// logged, not propagated.
    async fn abort(&mut self) -> Result<(), ConnectorError>;
}
