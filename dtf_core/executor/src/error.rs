use common::traits::ConnectorError;
use common::types::{UnitFailure, UnitPhase};
use thiserror::Error;

/// Failure of one unit attempt, tagged with the phase it happened in.
#[derive(Debug, Error)]
#[error("{phase} phase failed: {source}")]
pub struct UnitError {
    pub phase: UnitPhase,
    #[source]
    pub source: ConnectorError,
}

impl UnitError {
    pub fn new(phase: UnitPhase, source: ConnectorError) -> Self {
        Self { phase, source }
    }

    pub fn cancelled(phase: UnitPhase) -> Self {
        Self {
            phase,
            source: ConnectorError::Cancelled,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ConnectorError::Cancelled)
    }

    pub fn into_failure(self) -> UnitFailure {
        if self.is_cancelled() {
            UnitFailure::cancelled(self.phase)
        } else {
            UnitFailure::new(self.phase, self.source.to_string())
        }
    }
}
