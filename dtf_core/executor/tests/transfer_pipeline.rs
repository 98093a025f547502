//! Full-pipeline tests: statement text through grammar, analyzer and engine
//! against memory-backed connectors.

use common::types::{Cell, ConcreteEntity};
use connectors::{MemoryConnectorProvider, MemoryStore};
use executor::TransferEngine;
use grammar::{dispatch, Dispatched, TransferStatement};
use planner::Analyzer;
use registry::ConnectorRegistry;
use std::sync::Arc;

fn parse(sql: &str) -> TransferStatement {
    match dispatch(sql).expect("parse failed") {
        Dispatched::Transfer(stmt) => stmt,
        other => panic!("expected transfer statement, got {other:?}"),
    }
}

#[tokio::test]
async fn pattern_fan_in_with_provenance_column() {
    let mysql = MemoryStore::new();
    mysql.seed(
        ConcreteEntity::new("cdc_demos_1", "account_7"),
        vec!["id", "name"],
        vec![
            vec![Cell::Integer(1), Cell::String("ada".into())],
            vec![Cell::Integer(2), Cell::String("bob".into())],
        ],
    );
    mysql.seed(
        ConcreteEntity::new("cdc_demos_2", "account_9"),
        vec!["id", "name"],
        vec![vec![Cell::Integer(3), Cell::String("cyn".into())]],
    );
    let warehouse = MemoryStore::new();

    let registry = ConnectorRegistry::new();
    registry
        .register(Arc::new(MemoryConnectorProvider::with_store("mysql", mysql)))
        .expect("register failed");
    registry
        .register(Arc::new(MemoryConnectorProvider::with_store(
            "warehouse",
            warehouse.clone(),
        )))
        .expect("register failed");

    let statement = parse(
        r#"
        DATATUNNEL SOURCE("mysql") OPTIONS (
            schemaName = 'cdc_demos_[0-9]+',
            tableName = 'account_[0-9]+',
            columns = ["id", "name", "dt_meta_table"]
        )
        SINK("warehouse") OPTIONS (
            schemaName = "analytics",
            tableName = "accounts",
            columns = ["id", "username", "table_name"]
        )
    "#,
    );

    let plan = Analyzer::new(&registry)
        .resolve(&statement)
        .await
        .expect("resolve failed");
    assert_eq!(plan.len(), 2);

    let report = TransferEngine::new(registry).execute(plan).await;
    assert!(report.succeeded(), "report: {report:?}");
    assert_eq!(report.total_rows_written(), 3);

    let table = warehouse
        .table(&ConcreteEntity::new("analytics", "accounts"))
        .expect("sink table missing");
    assert_eq!(
        table.columns,
        vec![
            "id".to_string(),
            "username".to_string(),
            "table_name".to_string()
        ]
    );
    assert_eq!(table.rows.len(), 3);

    let provenance: Vec<String> = table
        .rows
        .iter()
        .map(|row| row[2].to_string())
        .collect();
    assert_eq!(
        provenance
            .iter()
            .filter(|p| p.as_str() == "cdc_demos_1.account_7")
            .count(),
        2
    );
    assert_eq!(
        provenance
            .iter()
            .filter(|p| p.as_str() == "cdc_demos_2.account_9")
            .count(),
        1
    );
}

#[tokio::test]
async fn upsert_statement_replaces_matching_rows() {
    let mysql = MemoryStore::new();
    mysql.seed(
        ConcreteEntity::new("pipeline", "cyj_test1"),
        vec!["ID", "NAME"],
        vec![
            vec![Cell::Integer(1), Cell::String("new1".into())],
            vec![Cell::Integer(2), Cell::String("new2".into())],
        ],
    );
    let oracle = MemoryStore::new();
    oracle.seed(
        ConcreteEntity::new("FLINKUSER", "DEMOS"),
        vec!["ID", "NAME"],
        vec![
            vec![Cell::Integer(2), Cell::String("old2".into())],
            vec![Cell::Integer(3), Cell::String("old3".into())],
        ],
    );

    let registry = ConnectorRegistry::new();
    registry
        .register(Arc::new(MemoryConnectorProvider::with_store("mysql", mysql)))
        .expect("register failed");
    registry
        .register(Arc::new(MemoryConnectorProvider::with_store(
            "oracle",
            oracle.clone(),
        )))
        .expect("register failed");

    let statement = parse(
        r#"
        Datatunnel source('mysql') OPTIONS(
            "schemaName" = "pipeline"
            ,"tableName" = "cyj_test1"
            ,"columns" = ["*"]
        )
        sink('oracle') OPTIONS(
            "schemaName" = "FLINKUSER"
            ,"tableName" = "DEMOS"
            ,"writeMode" = "UPSERT"
            ,"upsertKeyColumns" = ["ID"]
        )
    "#,
    );

    let plan = Analyzer::new(&registry)
        .resolve(&statement)
        .await
        .expect("resolve failed");
    assert_eq!(plan.len(), 1);

    let report = TransferEngine::new(registry).execute(plan).await;
    assert!(report.succeeded(), "report: {report:?}");

    let table = oracle
        .table(&ConcreteEntity::new("FLINKUSER", "DEMOS"))
        .expect("sink table missing");
    assert_eq!(table.rows.len(), 3);
    assert_eq!(
        table.rows[0],
        vec![Cell::Integer(2), Cell::String("new2".into())]
    );
    assert_eq!(
        table.rows[1],
        vec![Cell::Integer(3), Cell::String("old3".into())]
    );
    assert_eq!(
        table.rows[2],
        vec![Cell::Integer(1), Cell::String("new1".into())]
    );
}
