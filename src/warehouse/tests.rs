//! Tests for the warehouse module

use super::*;
use crate::config::{WarehouseConfig, WarehouseKind};
use crate::types::{JsonObject, Record, WriteMode};
use crate::Error;
use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_micro_opt(9, 26, 53, 589_793)
        .unwrap()
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

// ============================================================================
// Sanitizer Tests
// ============================================================================

#[test]
fn test_sanitize_key() {
    assert_eq!(sanitize_key("$ref"), "_ref");
    assert_eq!(sanitize_key("e-mail address"), "e_mail_address");
    assert_eq!(sanitize_key("@id#1.x"), "_id_1_x");
    assert_eq!(sanitize_key("plain_key"), "plain_key");
}

#[test]
fn test_sanitize_nested_and_stamp() {
    let record = json!({"a.b": 1, "c d": {"e-f": 2}});
    let row = prepare_row(&record, at());

    assert_eq!(
        Value::Object(row),
        json!({
            "a_b": 1,
            "c_d": {"e_f": 2},
            "_extracted_at": "2025-03-14T09:26:53.589793"
        })
    );
}

#[test]
fn test_sanitize_list_of_objects() {
    let record = json!({
        "lignes": [{"prix unitaire": 3.5}, "note libre", {"qté-max": 2}],
        "tags": ["a.b", "c d"],
        "matrix": [[{"x.y": 1}]]
    });

    assert_eq!(
        sanitize(&record),
        json!({
            "lignes": [{"prix_unitaire": 3.5}, "note libre", {"qté_max": 2}],
            "tags": ["a.b", "c d"],
            "matrix": [[{"x.y": 1}]]
        })
    );
}

#[test]
fn test_sanitize_is_idempotent() {
    let record = json!({
        "a.b": {"c d": [{"e-f": null}]},
        "$x": [1, 2, 3],
        "a_b": "clean",
        "a-b": "dirty"
    });

    let once = sanitize(&record);
    assert_eq!(sanitize(&once), once);
}

#[test]
fn test_sanitize_preserves_values() {
    let record = json!({"n.1": 1, "s 2": "text", "l-3": [1, 2, 3], "b": true, "z": null});
    let clean = sanitize(&record);

    assert_eq!(clean["n_1"], 1);
    assert_eq!(clean["s_2"], "text");
    assert_eq!(clean["l_3"].as_array().unwrap().len(), 3);
    assert_eq!(clean["b"], true);
    assert_eq!(clean["z"], Value::Null);
}

#[test]
fn test_sanitize_collisions_get_suffixes() {
    let record = json!({"a b": 1, "a-b": 2, "a.b": 3, "a_b": 0});
    let clean = sanitize(&record);

    // clean key keeps its name, the others take suffixes in key order
    assert_eq!(clean["a_b"], 0);
    assert_eq!(clean["a_b_2"], 1);
    assert_eq!(clean["a_b_3"], 2);
    assert_eq!(clean["a_b_4"], 3);
    assert_eq!(clean.as_object().unwrap().len(), 4);
}

#[test]
fn test_sanitize_scalars_pass_through() {
    assert_eq!(sanitize(&json!("a.b")), json!("a.b"));
    assert_eq!(sanitize(&json!(42)), json!(42));
    assert_eq!(sanitize(&json!([])), json!([]));
}

#[test]
fn test_prepare_row_wraps_scalars() {
    let row = prepare_row(&json!(7), at());
    assert_eq!(row["value"], 7);
    assert!(row.contains_key(EXTRACTED_AT));
}

// ============================================================================
// Backup Tests
// ============================================================================

#[test]
fn test_write_backup_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = vec![json!({"nom.complet": "Zoé Lefèvre", "id": 1})];

    let path = write_backup(dir.path(), "Extract_Sofia", "entites", &records, at()).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "backup_Extract_Sofia_entites_20250314_092653.json"
    );

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("Zoé Lefèvre"));
    assert!(content.contains("\n  {"));

    let back: Vec<Record> = serde_json::from_str(&content).unwrap();
    assert_eq!(back, records);
}

#[test]
fn test_write_backup_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<Record> = vec![json!({"id": 1})];

    let first = write_backup(dir.path(), "ds", "t", &records, at()).unwrap();
    let second = write_backup(dir.path(), "ds", "t", &records, at()).unwrap();

    assert_ne!(first, second);
    assert!(second.to_str().unwrap().ends_with("_2.json"));
}

// ============================================================================
// Loader Tests
// ============================================================================

#[derive(Default)]
struct FakeWarehouse {
    exists: bool,
    fail_load: bool,
    calls: Mutex<Vec<String>>,
    loads: Mutex<Vec<(String, Vec<JsonObject>, WriteMode)>>,
}

impl FakeWarehouse {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn dataset_exists(&self, dataset: &str) -> crate::Result<bool> {
        self.calls.lock().unwrap().push(format!("exists:{dataset}"));
        Ok(self.exists)
    }

    async fn create_dataset(&self, dataset: &str, location: &str) -> crate::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create:{dataset}:{location}"));
        Ok(())
    }

    async fn load_json(
        &self,
        _dataset: &str,
        table: &str,
        rows: &[JsonObject],
        mode: WriteMode,
    ) -> crate::Result<LoadOutcome> {
        self.calls.lock().unwrap().push(format!("load:{table}"));
        if self.fail_load {
            return Err(Error::load(table, "quota exceeded"));
        }
        self.loads
            .lock()
            .unwrap()
            .push((table.to_string(), rows.to_vec(), mode));
        Ok(LoadOutcome {
            rows: rows.len(),
            reference: "job-1".to_string(),
        })
    }
}

fn loader(warehouse: Arc<FakeWarehouse>, backup_dir: PathBuf) -> Loader {
    Loader::new(warehouse, "Extract_Sofia", "EU", backup_dir)
}

#[tokio::test]
async fn test_loader_empty_batch_makes_no_call() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(FakeWarehouse::default());
    let loader = loader(Arc::clone(&warehouse), dir.path().to_path_buf());

    assert!(!loader.load(&[], "entites", WriteMode::Append).await);
    assert!(warehouse.calls().is_empty());
}

#[tokio::test]
async fn test_loader_sanitizes_and_stamps() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(FakeWarehouse::default());
    let loader = loader(Arc::clone(&warehouse), dir.path().to_path_buf());

    let records = vec![json!({"a.b": 1}), json!({"a.b": 2})];
    assert!(loader.load(&records, "Stage_Soc_2", WriteMode::Truncate).await);

    let loads = warehouse.loads.lock().unwrap();
    let (table, rows, mode) = &loads[0];
    assert_eq!(table, "Stage_Soc_2");
    assert_eq!(*mode, WriteMode::Truncate);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["a_b"], 2);
    assert!(rows.iter().all(|r| r.contains_key(EXTRACTED_AT)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_loader_failure_writes_one_backup() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(FakeWarehouse {
        fail_load: true,
        ..Default::default()
    });
    let loader = loader(Arc::clone(&warehouse), dir.path().to_path_buf());

    let records = vec![json!({"a.b": 1, "nested": {"c d": true}})];
    assert!(!loader.load(&records, "entites", WriteMode::Append).await);

    let backups: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);

    let name = backups[0].file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("backup_Extract_Sofia_entites_"));

    // the backup holds the batch as extracted, not the sanitized rows
    let saved: Vec<Record> =
        serde_json::from_str(&std::fs::read_to_string(&backups[0]).unwrap()).unwrap();
    assert_eq!(saved, records);
}

#[tokio::test]
async fn test_loader_backup_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let warehouse = Arc::new(FakeWarehouse {
        fail_load: true,
        ..Default::default()
    });
    let loader = loader(warehouse, blocker);

    assert!(!loader.load(&[json!({"id": 1})], "t", WriteMode::Append).await);
}

#[tokio::test]
async fn test_ensure_dataset_creates_once() {
    let warehouse = Arc::new(FakeWarehouse::default());
    let loader = loader(Arc::clone(&warehouse), PathBuf::from("."));

    loader.ensure_dataset().await.unwrap();
    loader.ensure_dataset().await.unwrap();

    assert_eq!(
        warehouse.calls(),
        vec!["exists:Extract_Sofia", "create:Extract_Sofia:EU"]
    );
}

#[tokio::test]
async fn test_ensure_dataset_existing() {
    let warehouse = Arc::new(FakeWarehouse {
        exists: true,
        ..Default::default()
    });
    let loader = loader(Arc::clone(&warehouse), PathBuf::from("."));

    loader.ensure_dataset().await.unwrap();
    assert_eq!(warehouse.calls(), vec!["exists:Extract_Sofia"]);
}

// ============================================================================
// Parquet Warehouse Tests
// ============================================================================

fn read_rows(path: &std::path::Path) -> (usize, Vec<String>) {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let builder = ParquetRecordBatchReaderBuilder::try_new(std::fs::File::open(path).unwrap()).unwrap();
    let columns = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let rows = builder.build().unwrap().map(|b| b.unwrap().num_rows()).sum();
    (rows, columns)
}

#[tokio::test]
async fn test_parquet_append_and_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = ParquetWarehouse::new(dir.path());

    assert!(!warehouse.dataset_exists("mysql_data").await.unwrap());
    warehouse.create_dataset("mysql_data", "EU").await.unwrap();
    assert!(warehouse.dataset_exists("mysql_data").await.unwrap());

    let rows = vec![
        object(json!({"id": 1, "name": "a", "score": 1.5, "tags": ["x"], "meta": {"k": 1}})),
        object(json!({"id": 2, "name": null, "score": 2, "tags": [], "meta": {"k": 2}})),
    ];

    let outcome = warehouse
        .load_json("mysql_data", "clients", &rows, WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(outcome.rows, 2);
    warehouse
        .load_json("mysql_data", "clients", &rows, WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(warehouse.parts("mysql_data", "clients").unwrap().len(), 2);

    warehouse
        .load_json("mysql_data", "clients", &rows[..1], WriteMode::Truncate)
        .await
        .unwrap();
    let parts = warehouse.parts("mysql_data", "clients").unwrap();
    assert_eq!(parts.len(), 1);

    let (count, columns) = read_rows(&parts[0]);
    assert_eq!(count, 1);
    assert_eq!(columns, vec!["id", "meta", "name", "score", "tags"]);
}

#[tokio::test]
async fn test_parquet_failed_truncate_keeps_previous_part() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = ParquetWarehouse::new(dir.path());
    let rows = vec![object(json!({"id": 1}))];

    warehouse
        .load_json("mysql_data", "clients", &rows, WriteMode::Truncate)
        .await
        .unwrap();
    let before = warehouse.parts("mysql_data", "clients").unwrap();
    assert_eq!(before.len(), 1);

    // A directory in the way makes the staging write fail
    std::fs::create_dir(warehouse.staging_path("mysql_data", "clients")).unwrap();
    let result = warehouse
        .load_json("mysql_data", "clients", &rows, WriteMode::Truncate)
        .await;
    assert!(result.is_err());

    assert_eq!(warehouse.parts("mysql_data", "clients").unwrap(), before);
    assert_eq!(read_rows(&before[0]).0, 1);
}

#[test]
fn test_infer_schema_conflicts_fall_back_to_string() {
    let rows = vec![
        object(json!({"code": 1, "empty": null})),
        object(json!({"code": "A1", "empty": null})),
    ];

    let batch = rows_to_batch(&rows).unwrap();
    let schema = batch.schema();
    assert_eq!(
        schema.field_with_name("code").unwrap().data_type(),
        &arrow::datatypes::DataType::Utf8
    );
    assert_eq!(
        schema.field_with_name("empty").unwrap().data_type(),
        &arrow::datatypes::DataType::Utf8
    );
    assert_eq!(batch.num_rows(), 2);
}

// ============================================================================
// BigQuery Warehouse Tests
// ============================================================================

fn bigquery_config(endpoint: String) -> WarehouseConfig {
    WarehouseConfig {
        kind: WarehouseKind::Bigquery,
        project_id: "analytics-prod".to_string(),
        location: "EU".to_string(),
        credentials_path: None,
        access_token: Some("ya29.test".to_string()),
        endpoint: Some(endpoint),
        output_dir: None,
        backup_dir: PathBuf::from("."),
        poll_interval_ms: 10,
        job_timeout_seconds: 5,
    }
}

#[tokio::test]
async fn test_bigquery_dataset_exists() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/analytics-prod/datasets/Extract_Sofia"))
        .and(header("Authorization", "Bearer ya29.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/analytics-prod/datasets/mysql_data"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"code": 404}})))
        .expect(1)
        .mount(&server)
        .await;

    let warehouse = BigQueryWarehouse::from_config(&bigquery_config(server.uri())).unwrap();
    assert!(warehouse.dataset_exists("Extract_Sofia").await.unwrap());
    assert!(!warehouse.dataset_exists("mysql_data").await.unwrap());
}

#[tokio::test]
async fn test_bigquery_create_dataset_conflict_is_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/analytics-prod/datasets"))
        .and(body_string_contains("\"location\":\"EU\""))
        .respond_with(ResponseTemplate::new(409).set_body_string("Already Exists"))
        .expect(1)
        .mount(&server)
        .await;

    let warehouse = BigQueryWarehouse::from_config(&bigquery_config(server.uri())).unwrap();
    warehouse.create_dataset("mysql_data", "EU").await.unwrap();
}

#[tokio::test]
async fn test_bigquery_load_polls_until_done() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/bigquery/v2/projects/analytics-prod/jobs"))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains("\"writeDisposition\":\"WRITE_TRUNCATE\""))
        .and(body_string_contains("\"sourceFormat\":\"NEWLINE_DELIMITED_JSON\""))
        .and(body_string_contains("{\"a_b\":1}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"jobId": "job_42", "location": "EU"},
            "status": {"state": "RUNNING"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/analytics-prod/jobs/job_42"))
        .and(query_param("location", "EU"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"jobId": "job_42", "location": "EU"},
            "status": {"state": "DONE"},
            "statistics": {"load": {"outputRows": "1"}}
        })))
        .mount(&server)
        .await;

    let warehouse = BigQueryWarehouse::from_config(&bigquery_config(server.uri())).unwrap();
    let outcome = warehouse
        .load_json(
            "mysql_data",
            "clients",
            &[object(json!({"a_b": 1}))],
            WriteMode::Truncate,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LoadOutcome {
            rows: 1,
            reference: "job_42".to_string()
        }
    );
}

#[tokio::test]
async fn test_bigquery_job_error_is_load_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/bigquery/v2/projects/analytics-prod/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"jobId": "job_7"},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "Error while reading data"},
                "errors": [{"message": "Error while reading data"}, {"message": "No such field: x"}]
            }
        })))
        .mount(&server)
        .await;

    let warehouse = BigQueryWarehouse::from_config(&bigquery_config(server.uri())).unwrap();
    let err = warehouse
        .load_json("ds", "t", &[object(json!({"x": 1}))], WriteMode::Append)
        .await
        .unwrap_err();

    match err {
        Error::Load { table, message } => {
            assert_eq!(table, "t");
            assert_eq!(message, "Error while reading data (No such field: x)");
        }
        other => panic!("Expected Load error, got {other:?}"),
    }
}

#[test]
fn test_build_warehouse_parquet_needs_dir() {
    let mut config = bigquery_config("http://unused".to_string());
    config.kind = WarehouseKind::Parquet;
    assert!(build_warehouse(&config).is_err());

    config.output_dir = Some(PathBuf::from("out"));
    assert_eq!(build_warehouse(&config).unwrap().name(), "parquet");
}
