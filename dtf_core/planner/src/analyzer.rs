//! Statement analysis: validated clauses in, logical transfer plan out.
//!
//! The analyzer runs entirely before execution. Connector and role checks
//! fail fast, option maps are validated against the connectors' schemas
//! with every offending key reported, patterns are expanded against a
//! single catalog snapshot, and the resulting units are ordered by catalog
//! enumeration so reports reproduce across runs.

use crate::error::{ClauseRole, PlanError};
use common::config::PlannerSettings;
use common::types::{
    keys, ColumnMapping, ColumnRef, ConcreteEntity, EntityPattern, LogicalTransferPlan,
    NameMatcher, NamePart, OptionIssue, OptionMap, OptionSchema, Projection, ResolvedOptions,
    TransferUnit, WriteMode, PROVENANCE_COLUMN,
};
use grammar::{TransferClause, TransferStatement};
use registry::ConnectorRegistry;
use tracing::debug;

pub struct Analyzer<'a> {
    registry: &'a ConnectorRegistry,
    settings: PlannerSettings,
}

impl<'a> Analyzer<'a> {
    pub fn new(registry: &'a ConnectorRegistry) -> Self {
        Self::with_settings(registry, PlannerSettings::default())
    }

    pub fn with_settings(registry: &'a ConnectorRegistry, settings: PlannerSettings) -> Self {
        Self { registry, settings }
    }

    /// Turn a parsed statement into an executable plan.
    pub async fn resolve(
        &self,
        statement: &TransferStatement,
    ) -> Result<LogicalTransferPlan, PlanError> {
        // connector resolution and role checks come first so a statement
        // naming a bad connector fails before options are even looked at
        let source_desc = self.registry.resolve(&statement.source.connector)?;
        let sink_desc = self.registry.resolve(&statement.sink.connector)?;

        let source_role = source_desc.source().ok_or_else(|| {
            PlanError::role_mismatch(format!(
                "connector '{}' cannot act as a source",
                source_desc.name()
            ))
        })?;
        let sink_role = sink_desc.sink().ok_or_else(|| {
            PlanError::role_mismatch(format!(
                "connector '{}' cannot act as a sink",
                sink_desc.name()
            ))
        })?;

        let source_options =
            resolve_clause_options(ClauseRole::Source, &statement.source, &source_role.options)?;
        let sink_options =
            resolve_clause_options(ClauseRole::Sink, &statement.sink, &sink_role.options)?;

        let write_mode = resolve_write_mode(&sink_options)?;
        let upsert_keys = sink_options
            .get_list(keys::UPSERT_KEY_COLUMNS)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if write_mode == WriteMode::Upsert && upsert_keys.is_empty() {
            return Err(PlanError::invalid_write_mode(
                "UPSERT requires at least one upsertKeyColumns entry",
            ));
        }
        if !sink_desc.supports_write_mode(write_mode) {
            return Err(PlanError::invalid_write_mode(format!(
                "connector '{}' does not support {}",
                sink_desc.name(),
                write_mode
            )));
        }

        let source_pattern = entity_pattern(ClauseRole::Source, &source_options)?;
        let source_entities = match source_pattern.as_literal() {
            // a plain literal names exactly one entity; no catalog call
            Some(entity) => vec![entity],
            None => {
                let matched = self
                    .expand_against_catalog(&statement.source.connector, &source_options, &source_pattern)
                    .await?;
                if matched.is_empty() {
                    if self.settings.tolerate_empty_match {
                        debug!(
                            pattern = %pattern_text(&source_pattern),
                            "pattern matched nothing, producing an empty plan"
                        );
                        return Ok(LogicalTransferPlan::default());
                    }
                    return Err(PlanError::no_match(format!(
                        "source pattern {} matched no entities",
                        pattern_text(&source_pattern)
                    )));
                }
                matched
            }
        };

        let sink_pattern = entity_pattern(ClauseRole::Sink, &sink_options)?;
        let sink_entities = match sink_pattern.as_literal() {
            Some(entity) => vec![entity],
            None => {
                if !sink_desc.can_read() {
                    return Err(PlanError::cardinality(format!(
                        "sink pattern {} needs a catalog, but connector '{}' cannot enumerate one",
                        pattern_text(&sink_pattern),
                        sink_desc.name()
                    )));
                }
                let matched = self
                    .expand_against_catalog(&statement.sink.connector, &sink_options, &sink_pattern)
                    .await?;
                if matched.is_empty() {
                    return Err(PlanError::no_match(format!(
                        "sink pattern {} matched no entities",
                        pattern_text(&sink_pattern)
                    )));
                }
                matched
            }
        };

        let fan_in = sink_entities.len() == 1;
        if !fan_in && sink_entities.len() != source_entities.len() {
            return Err(PlanError::cardinality(format!(
                "{} source entities cannot map onto {} sink entities",
                source_entities.len(),
                sink_entities.len()
            )));
        }

        let projection = build_projection(
            source_options.get_list(keys::COLUMNS),
            sink_options.get_list(keys::COLUMNS),
        )?;
        let row_filter = source_options.get_str(keys::CONDITION).map(str::to_string);

        let units = source_entities
            .into_iter()
            .enumerate()
            .map(|(i, source_entity)| {
                let sink_entity = if fan_in {
                    sink_entities[0].clone()
                } else {
                    sink_entities[i].clone()
                };
                TransferUnit {
                    source_connector: statement.source.connector.clone(),
                    sink_connector: statement.sink.connector.clone(),
                    source_options: source_options.clone(),
                    sink_options: sink_options.clone(),
                    source_entity,
                    sink_entity,
                    projection: projection.clone(),
                    row_filter: row_filter.clone(),
                    write_mode,
                    upsert_keys: upsert_keys.clone(),
                }
            })
            .collect::<Vec<_>>();

        debug!(units = units.len(), mode = %write_mode, "statement resolved");
        Ok(LogicalTransferPlan::new(units))
    }

    /// One catalog snapshot per clause, taken before any unit executes.
    async fn expand_against_catalog(
        &self,
        connector: &str,
        options: &ResolvedOptions,
        pattern: &EntityPattern,
    ) -> Result<Vec<ConcreteEntity>, PlanError> {
        let mut source = self.registry.create_source(connector, options)?;
        source
            .list_entities(pattern.schema.raw(), pattern.table.raw())
            .await
            .map_err(|source| PlanError::Catalog { source })
    }
}

fn resolve_clause_options(
    clause: ClauseRole,
    raw: &TransferClause,
    schema: &OptionSchema,
) -> Result<ResolvedOptions, PlanError> {
    let (map, mut issues) = OptionMap::from_pairs(raw.options.iter().cloned());
    match schema.resolve(&map) {
        Ok(resolved) if issues.is_empty() => Ok(resolved),
        Ok(_) => Err(PlanError::option_validation(clause, issues)),
        Err(schema_issues) => {
            issues.extend(schema_issues);
            Err(PlanError::option_validation(clause, issues))
        }
    }
}

fn resolve_write_mode(sink_options: &ResolvedOptions) -> Result<WriteMode, PlanError> {
    let raw = sink_options.get_str(keys::WRITE_MODE).unwrap_or("APPEND");
    raw.parse::<WriteMode>()
        .map_err(|e| PlanError::invalid_write_mode(e.to_string()))
}

/// Read the schema/table pair out of resolved options, checking that any
/// regex part actually compiles.
fn entity_pattern(
    clause: ClauseRole,
    options: &ResolvedOptions,
) -> Result<EntityPattern, PlanError> {
    let mut issues = Vec::new();
    let schema_raw = options.get_str(keys::SCHEMA_NAME).unwrap_or_else(|| {
        issues.push(OptionIssue::missing(keys::SCHEMA_NAME));
        ""
    });
    let table_raw = options.get_str(keys::TABLE_NAME).unwrap_or_else(|| {
        issues.push(OptionIssue::missing(keys::TABLE_NAME));
        ""
    });

    let pattern = EntityPattern::parse(schema_raw, table_raw);
    for (key, part) in [
        (keys::SCHEMA_NAME, &pattern.schema),
        (keys::TABLE_NAME, &pattern.table),
    ] {
        if let NamePart::Pattern(raw) = part {
            if let Err(e) = NameMatcher::compile(raw) {
                issues.push(OptionIssue::invalid(key, e.to_string()));
            }
        }
    }

    if issues.is_empty() {
        Ok(pattern)
    } else {
        Err(PlanError::option_validation(clause, issues))
    }
}

fn pattern_text(pattern: &EntityPattern) -> String {
    format!("{}.{}", pattern.schema.raw(), pattern.table.raw())
}

fn is_wildcard(columns: &[String]) -> bool {
    matches!(columns, [only] if only == "*")
}

/// Column mapping rules: wildcard flows through unchanged; a named sink
/// list renames a named source list positionally; the reserved provenance
/// column becomes a synthetic value. Mismatched list shapes are rejected
/// rather than truncated or padded.
fn build_projection(
    source_columns: Option<&[String]>,
    sink_columns: Option<&[String]>,
) -> Result<Projection, PlanError> {
    let source_wildcard = source_columns.is_none_or(is_wildcard);
    let sink_named = sink_columns.filter(|cols| !is_wildcard(cols));

    if source_wildcard {
        return match sink_named {
            None => Ok(Projection::Wildcard),
            Some(_) => Err(PlanError::option_validation(
                ClauseRole::Sink,
                vec![OptionIssue::invalid(
                    keys::COLUMNS,
                    "a named sink column list cannot be mapped onto a wildcard source projection",
                )],
            )),
        };
    }

    let source_cols = source_columns.unwrap_or_default();
    if let Some(sink_cols) = sink_named {
        if sink_cols.len() != source_cols.len() {
            return Err(PlanError::option_validation(
                ClauseRole::Sink,
                vec![OptionIssue::invalid(
                    keys::COLUMNS,
                    format!(
                        "source projects {} columns but the sink names {}",
                        source_cols.len(),
                        sink_cols.len()
                    ),
                )],
            ));
        }
        let mappings = source_cols
            .iter()
            .zip(sink_cols.iter())
            .map(|(source, sink)| ColumnMapping {
                source: column_ref(source),
                sink_name: sink.clone(),
            })
            .collect();
        return Ok(Projection::Columns(mappings));
    }

    let mappings = source_cols
        .iter()
        .map(|source| ColumnMapping {
            source: column_ref(source),
            sink_name: source.clone(),
        })
        .collect();
    Ok(Projection::Columns(mappings))
}

fn column_ref(source: &str) -> ColumnRef {
    if source == PROVENANCE_COLUMN {
        ColumnRef::SourceEntityName
    } else {
        ColumnRef::Column(source.to_string())
    }
}
