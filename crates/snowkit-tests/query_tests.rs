//! Cached reads, parameter normalisation and the row-fetch fallback.

use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::{Capabilities, Event, MockWarehouse, sample_table, test_kit, warehouse};
use pretty_assertions::assert_eq;
use rstest::rstest;
use snowkit::{QueryOutput, ReadOptions, Snowkit};
use snowkit_core::{Cursor, QueryParams, SnowkitError, Value};
use snowkit_query::CacheStrategy;

async fn read(kit: &Snowkit, sql: &str, params: Option<&QueryParams>) -> Arc<QueryOutput> {
    kit.read_table(sql, params, ReadOptions::default())
        .await
        .unwrap()
        .into_output()
        .unwrap()
}

#[rstest]
#[case::memoized(CacheStrategy::in_memory(), 1)]
#[case::disabled(CacheStrategy::Disabled, 3)]
#[tokio::test]
async fn test_strategy_decides_execution_count(
    warehouse: Arc<MockWarehouse>,
    #[case] cache: CacheStrategy,
    #[case] expected_runs: usize,
) {
    let kit = test_kit(warehouse.clone(), cache);

    for _ in 0..3 {
        read(&kit, "SELECT * FROM ORDERS", None).await;
    }

    assert_eq!(warehouse.journal().statements().len(), expected_runs);
}

#[rstest]
#[tokio::test]
async fn test_empty_and_absent_params_are_no_parameters(warehouse: Arc<MockWarehouse>) {
    let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());

    let with_empty = read(&kit, "SELECT 1", Some(&QueryParams::new())).await;
    let with_none = read(&kit, "SELECT 1", None).await;

    assert!(Arc::ptr_eq(&with_empty, &with_none));
    let events = warehouse.journal().events();
    let executes: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Execute { params, .. } => Some(params.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(executes, vec![None]);
}

#[rstest]
#[tokio::test]
async fn test_param_order_shares_cache_entry(warehouse: Arc<MockWarehouse>) {
    let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());
    let forward = QueryParams::new().with("region", "EU").with("limit", 10i64);
    let reversed = QueryParams::new().with("limit", 10i64).with("region", "EU");
    let different = QueryParams::new().with("limit", 11i64).with("region", "EU");

    read(&kit, "SELECT * FROM ORDERS WHERE REGION = :region LIMIT :limit", Some(&forward)).await;
    read(&kit, "SELECT * FROM ORDERS WHERE REGION = :region LIMIT :limit", Some(&reversed)).await;
    read(&kit, "SELECT * FROM ORDERS WHERE REGION = :region LIMIT :limit", Some(&different)).await;

    assert_eq!(warehouse.journal().statements().len(), 2);
}

#[rstest]
#[tokio::test]
async fn test_ttl_expiry_runs_again(warehouse: Arc<MockWarehouse>) {
    let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());
    let options = ReadOptions::default().ttl(Duration::from_millis(30));

    kit.read_table("SELECT 1", None, options.clone()).await.unwrap();
    kit.read_table("SELECT 1", None, options.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    kit.read_table("SELECT 1", None, options).await.unwrap();

    assert_eq!(warehouse.journal().statements().len(), 2);
}

/// A failing columnar fetch falls back to rows plus cursor column names
#[tokio::test]
async fn test_bulk_fetch_failure_falls_back_to_rows() {
    let columnar = Arc::new(MockWarehouse::default());
    let row_only = Arc::new(MockWarehouse::with_capabilities(Capabilities {
        bulk_fetch: false,
        ..Default::default()
    }));

    let from_columnar = read(&test_kit(columnar, CacheStrategy::Disabled), "SELECT 1", None).await;
    let from_rows = read(&test_kit(row_only, CacheStrategy::Disabled), "SELECT 1", None).await;

    assert_eq!(from_columnar, from_rows);
    let table = from_rows.as_table().unwrap();
    assert_eq!(table.column_names(), sample_table().column_names());
    assert_eq!(table.records(), sample_table().records());
}

#[rstest]
#[tokio::test]
async fn test_rows_format_returns_positional_rows(warehouse: Arc<MockWarehouse>) {
    let mut drivers = snowkit::DriverRegistry::new();
    drivers.register(warehouse.clone());
    let kit = Snowkit::builder()
        .drivers(drivers)
        .resolver(crate::fixtures::test_resolver(&[]))
        .output_format(snowkit::OutputFormat::Rows)
        .build()
        .unwrap();

    let output = read(&kit, "SELECT 1", None).await;

    assert_eq!(
        *output,
        QueryOutput::Rows(vec![
            vec![Value::Int64(1), Value::String("EU".into())],
            vec![Value::Int64(2), Value::Null],
        ])
    );
}

#[rstest]
#[tokio::test]
async fn test_query_errors_propagate_and_are_not_cached(warehouse: Arc<MockWarehouse>) {
    let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());

    for _ in 0..2 {
        let err = kit
            .read_table("SELECT * FROM FAIL", None, ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnowkitError::Query(ref msg) if msg.contains("does not exist")));
    }
    assert_eq!(warehouse.journal().statements().len(), 2);
}

#[rstest]
#[tokio::test]
async fn test_raw_cursor_reads_uncached(warehouse: Arc<MockWarehouse>) {
    let kit = test_kit(warehouse.clone(), CacheStrategy::in_memory());

    let mut cursor = kit
        .read_table("SELECT 1", None, ReadOptions::default().raw_cursor())
        .await
        .unwrap()
        .into_cursor()
        .unwrap();

    assert_eq!(cursor.description().len(), 2);
    assert_eq!(cursor.fetch_all().await.unwrap().len(), 2);
    read(&kit, "SELECT 1", None).await;
    assert_eq!(warehouse.journal().statements().len(), 2);
}
