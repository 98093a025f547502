use clap::Args;
use common::config::TunnelSettings;
use common::error::TunnelError;
use common::types::{ColumnRef, JobReport, Projection, TransferUnit, UnitStatus};
use executor::TransferEngine;
use grammar::{dispatch, Dispatched, TransferStatement};
use planner::Analyzer;
use registry::ConnectorRegistry;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct RunArgs {
    /// statement text
    #[arg(long = "sql", short = 's', conflicts_with = "file")]
    pub sql: Option<String>,
    /// file containing the statement
    #[arg(long = "file", short = 'f')]
    pub file: Option<PathBuf>,
    /// print the job report as JSON
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args)]
pub struct ExplainArgs {
    #[arg(long = "sql", short = 's', conflicts_with = "file")]
    pub sql: Option<String>,
    #[arg(long = "file", short = 'f')]
    pub file: Option<PathBuf>,
}

fn read_statement(sql: Option<String>, file: Option<PathBuf>) -> Result<String, TunnelError> {
    match (sql, file) {
        (Some(sql), _) => Ok(sql),
        (None, Some(path)) => fs::read_to_string(&path).map_err(|e| {
            TunnelError::parse_msg(format!("could not read {}: {e}", path.display()))
        }),
        (None, None) => Err(TunnelError::parse_msg(
            "provide a statement with --sql or --file",
        )),
    }
}

fn bootstrapped_registry() -> Result<&'static ConnectorRegistry, TunnelError> {
    let registry = ConnectorRegistry::global();
    connectors::register_builtins(registry).map_err(TunnelError::run)?;
    Ok(registry)
}

fn parse_transfer(sql: &str) -> Result<Option<TransferStatement>, TunnelError> {
    match dispatch(sql).map_err(TunnelError::parse)? {
        Dispatched::Transfer(stmt) => Ok(Some(stmt)),
        Dispatched::Host(stmts) => {
            info!(
                "not a transfer statement; {} statement(s) delegated to the host engine",
                stmts.len()
            );
            Ok(None)
        }
    }
}

pub fn handle_run(args: RunArgs, config_path: Option<PathBuf>) -> Result<(), TunnelError> {
    let settings = TunnelSettings::load(config_path).map_err(TunnelError::run)?;
    let sql = read_statement(args.sql, args.file)?;
    let registry = bootstrapped_registry()?;

    let Some(statement) = parse_transfer(&sql)? else {
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new().map_err(TunnelError::run)?;
    runtime.block_on(async {
        let plan = Analyzer::with_settings(registry, settings.planner)
            .resolve(&statement)
            .await
            .map_err(TunnelError::plan)?;
        let engine = TransferEngine::with_settings(registry.clone(), settings.engine);
        let report = engine.execute(plan).await;
        render_report(&report, args.json)?;

        if report.succeeded() {
            Ok(())
        } else {
            let (_, failed, skipped) = report.counts();
            Err(TunnelError::run_msg(format!(
                "{failed} unit(s) failed, {skipped} skipped"
            )))
        }
    })
}

pub fn handle_explain(args: ExplainArgs, config_path: Option<PathBuf>) -> Result<(), TunnelError> {
    let settings = TunnelSettings::load(config_path).map_err(TunnelError::run)?;
    let sql = read_statement(args.sql, args.file)?;
    let registry = bootstrapped_registry()?;

    let Some(statement) = parse_transfer(&sql)? else {
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new().map_err(TunnelError::run)?;
    let plan = runtime.block_on(async {
        Analyzer::with_settings(registry, settings.planner)
            .resolve(&statement)
            .await
            .map_err(TunnelError::plan)
    })?;

    println!("plan: {} unit(s)", plan.len());
    for (i, unit) in plan.units.iter().enumerate() {
        println!(
            "  [{i}] {} -> {} ({}{})",
            unit.source_entity,
            unit.sink_entity,
            unit.write_mode,
            upsert_suffix(unit)
        );
        println!("      columns: {}", projection_text(&unit.projection));
        if let Some(filter) = &unit.row_filter {
            println!("      condition: {filter}");
        }
    }
    Ok(())
}

pub fn handle_connectors() -> Result<(), TunnelError> {
    let registry = bootstrapped_registry()?;
    for name in registry.connector_names() {
        let descriptor = registry.resolve(&name).map_err(TunnelError::run)?;
        let mut roles = Vec::new();
        if descriptor.can_read() {
            roles.push("source".to_string());
        }
        if let Some(sink) = descriptor.sink() {
            let modes = sink
                .write_modes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("/");
            roles.push(format!("sink [{modes}]"));
        }
        println!("{name}: {}", roles.join(", "));
    }
    Ok(())
}

fn upsert_suffix(unit: &TransferUnit) -> String {
    if unit.upsert_keys.is_empty() {
        String::new()
    } else {
        format!(" keys {:?}", unit.upsert_keys)
    }
}

fn projection_text(projection: &Projection) -> String {
    match projection {
        Projection::Wildcard => "*".to_string(),
        Projection::Columns(mappings) => mappings
            .iter()
            .map(|m| match &m.source {
                ColumnRef::Column(name) if *name == m.sink_name => name.clone(),
                ColumnRef::Column(name) => format!("{name} as {}", m.sink_name),
                ColumnRef::SourceEntityName => format!("<source entity> as {}", m.sink_name),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn render_report(report: &JobReport, json: bool) -> Result<(), TunnelError> {
    if json {
        let rendered = serde_json::to_string_pretty(report).map_err(TunnelError::run)?;
        println!("{rendered}");
        return Ok(());
    }

    for unit in &report.units {
        let status = match unit.status {
            UnitStatus::Succeeded => "ok",
            UnitStatus::Failed => "FAILED",
            UnitStatus::Skipped => "skipped",
        };
        match &unit.error {
            Some(failure) => println!(
                "{status:>8}  {}  read {} written {}  ({failure})",
                unit.unit, unit.rows_read, unit.rows_written
            ),
            None => println!(
                "{status:>8}  {}  read {} written {}",
                unit.unit, unit.rows_read, unit.rows_written
            ),
        }
    }
    let (succeeded, failed, skipped) = report.counts();
    println!(
        "job {}: {} succeeded, {} failed, {} skipped",
        report.job_id, succeeded, failed, skipped
    );
    Ok(())
}
