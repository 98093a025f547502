pub mod entity;
pub mod options;
pub mod plan;
pub mod report;
pub mod rows;
pub mod write_mode;

pub use entity::{is_plain_identifier, ConcreteEntity, EntityPattern, NameMatcher, NamePart};
pub use options::{
    keys, OptionIssue, OptionIssueKind, OptionKind, OptionMap, OptionSchema, OptionSpec,
    OptionValue, ResolvedOptions,
};
pub use plan::{
    ColumnMapping, ColumnRef, LogicalTransferPlan, Projection, TransferUnit, PROVENANCE_COLUMN,
};
pub use report::{JobReport, TransferUnitResult, UnitFailure, UnitPhase, UnitStatus, UnitSummary};
pub use rows::{Cell, RowBatch};
pub use write_mode::{ParseWriteModeError, WriteMode};
