use crate::types::entity::ConcreteEntity;
use crate::types::options::ResolvedOptions;
use crate::types::write_mode::WriteMode;

/// Reserved column name. When a statement's column lists name it, the
/// engine fills that position with the originating `schema.table` string
/// instead of reading it from the source.
pub const PROVENANCE_COLUMN: &str = "dt_meta_table";

/// Where a sink column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// A named source column.
    Column(String),
    /// The qualified name of the unit's source entity.
    SourceEntityName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: ColumnRef,
    pub sink_name: String,
}

/// Column selection for one transfer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// All source columns, as discovered at read time, identity-named.
    Wildcard,
    /// An explicit ordered mapping of source columns to sink columns.
    Columns(Vec<ColumnMapping>),
}

impl Projection {
    /// The columns to request from the source. An empty vector means "all"
    /// (wildcard), matching the read contract.
    pub fn read_columns(&self) -> Vec<String> {
        match self {
            Projection::Wildcard => Vec::new(),
            Projection::Columns(mappings) => mappings
                .iter()
                .filter_map(|m| match &m.source {
                    ColumnRef::Column(name) => Some(name.clone()),
                    ColumnRef::SourceEntityName => None,
                })
                .collect(),
        }
    }
}

/// One source-entity-to-sink-entity copy within a plan. Built once by the
/// analyzer and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TransferUnit {
    pub source_connector: String,
    pub sink_connector: String,
    pub source_options: ResolvedOptions,
    pub sink_options: ResolvedOptions,
    pub source_entity: ConcreteEntity,
    pub sink_entity: ConcreteEntity,
    pub projection: Projection,
    pub row_filter: Option<String>,
    pub write_mode: WriteMode,
    pub upsert_keys: Vec<String>,
}

/// Ordered transfer units for one statement. Unit order follows catalog
/// enumeration order so repeated runs against an unchanged catalog produce
/// identically ordered reports.
#[derive(Debug, Clone, Default)]
pub struct LogicalTransferPlan {
    pub units: Vec<TransferUnit>,
}

impl LogicalTransferPlan {
    pub fn new(units: Vec<TransferUnit>) -> Self {
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
