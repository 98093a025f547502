use crate::types::entity::ConcreteEntity;
use crate::types::write_mode::WriteMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Execution phase a unit failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    Open,
    Prepare,
    Read,
    Write,
    Commit,
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitPhase::Open => "open",
            UnitPhase::Prepare => "prepare",
            UnitPhase::Read => "read",
            UnitPhase::Write => "write",
            UnitPhase::Commit => "commit",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub phase: UnitPhase,
    pub message: String,
    /// Set when the failure was a job-level cancellation rather than a
    /// connector or data problem.
    pub cancelled: bool,
}

impl UnitFailure {
    pub fn new(phase: UnitPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn cancelled(phase: UnitPhase) -> Self {
        Self {
            phase,
            message: "job cancelled".to_string(),
            cancelled: true,
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} phase: {}", self.phase, self.message)
    }
}

/// Identifying slice of a unit, kept free of connection options so the
/// report can be serialized without leaking credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub source: ConcreteEntity,
    pub sink: ConcreteEntity,
    pub write_mode: WriteMode,
}

impl fmt::Display for UnitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.sink, self.write_mode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferUnitResult {
    pub unit: UnitSummary,
    pub status: UnitStatus,
    pub rows_read: u64,
    pub rows_written: u64,
    pub error: Option<UnitFailure>,
}

impl TransferUnitResult {
    pub fn succeeded(unit: UnitSummary, rows_read: u64, rows_written: u64) -> Self {
        Self {
            unit,
            status: UnitStatus::Succeeded,
            rows_read,
            rows_written,
            error: None,
        }
    }

    pub fn failed(unit: UnitSummary, rows_read: u64, rows_written: u64, error: UnitFailure) -> Self {
        Self {
            unit,
            status: UnitStatus::Failed,
            rows_read,
            rows_written,
            error: Some(error),
        }
    }

    pub fn skipped(unit: UnitSummary) -> Self {
        Self {
            unit,
            status: UnitStatus::Skipped,
            rows_read: 0,
            rows_written: 0,
            error: None,
        }
    }
}

/// Aggregated outcome of one statement run, in plan order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<TransferUnitResult>,
}

impl JobReport {
    /// The job as a whole succeeded only if every unit succeeded.
    pub fn succeeded(&self) -> bool {
        self.units
            .iter()
            .all(|u| u.status == UnitStatus::Succeeded)
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for unit in &self.units {
            match unit.status {
                UnitStatus::Succeeded => succeeded += 1,
                UnitStatus::Failed => failed += 1,
                UnitStatus::Skipped => skipped += 1,
            }
        }
        (succeeded, failed, skipped)
    }

    pub fn total_rows_written(&self) -> u64 {
        self.units.iter().map(|u| u.rows_written).sum()
    }
}
