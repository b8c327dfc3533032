//! Single point of access to the persistent DuckDB file.
//!
//! One connection is opened at startup and shared behind a mutex, so at most
//! one statement is in flight at any instant. Both the sampler (via
//! [`QueryStore::append`]) and the RPC endpoint (via [`QueryStore::execute`])
//! go through this serialization point.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use duckdb::types::{TimeUnit, Value};
use duckdb::{params, Connection};
use serde_json::{Number, Value as Json};
use thiserror::Error;

use crate::types::{MetricSample, QueryResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS system_metrics (
    timestamp TIMESTAMP,
    cpu_percent DOUBLE,
    memory_percent DOUBLE,
    memory_mb DOUBLE
)";

const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: duckdb::Error,
    },
    /// Statement-level failure; carries the engine's message verbatim.
    #[error("{0}")]
    Execute(String),
}

impl From<duckdb::Error> for QueryError {
    fn from(e: duckdb::Error) -> Self {
        QueryError::Execute(e.to_string())
    }
}

#[derive(Clone)]
pub struct QueryStore {
    conn: Arc<Mutex<Connection>>,
}

impl QueryStore {
    /// Opens (or creates) the database file and ensures the metrics table
    /// exists. An existing file is reused as-is, never recreated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let open_err = |source| QueryError::Open {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs caller-supplied SQL verbatim, DDL/DML included. The open query
    /// surface is intentional; do not add validation here.
    pub fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let columns: Vec<String> = rows
            .as_ref()
            .map(|s| s.column_names().iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        let width = columns.len();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut rec = Vec::with_capacity(width);
            for idx in 0..width {
                let value: Value = row.get(idx)?;
                rec.push(scalar_to_json(value));
            }
            out.push(rec);
        }
        Ok(QueryResult { columns, rows: out })
    }

    /// Inserts one sample into the metrics table. Used only by the sampler.
    pub fn append(&self, sample: &MetricSample) -> Result<(), QueryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO system_metrics (timestamp, cpu_percent, memory_percent, memory_mb) \
             VALUES (CAST(? AS TIMESTAMP), ?, ?, ?)",
            params![
                format_naive(sample.timestamp.naive_utc()),
                sample.cpu_percent,
                sample.memory_percent,
                sample.memory_mb
            ],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueryError> {
        self.conn
            .lock()
            .map_err(|_| QueryError::Execute("store connection mutex poisoned".into()))
    }
}

fn format_naive(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FMT).to_string()
}

fn float_json(f: f64) -> Json {
    Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null)
}

/// Maps a DuckDB scalar to its JSON wire representation. Timestamps become
/// ISO-8601 strings; exotic types degrade to strings rather than erroring.
fn scalar_to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(b),
        Value::TinyInt(i) => Json::from(i),
        Value::SmallInt(i) => Json::from(i),
        Value::Int(i) => Json::from(i),
        Value::BigInt(i) => Json::from(i),
        Value::UTinyInt(i) => Json::from(i),
        Value::USmallInt(i) => Json::from(i),
        Value::UInt(i) => Json::from(i),
        Value::UBigInt(i) => Json::from(i),
        Value::HugeInt(i) => i64::try_from(i)
            .map(Json::from)
            .unwrap_or_else(|_| Json::String(i.to_string())),
        Value::Float(f) => float_json(f as f64),
        Value::Double(f) => float_json(f),
        Value::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(float_json)
            .unwrap_or_else(|_| Json::String(d.to_string())),
        Value::Text(s) => Json::String(s),
        Value::Enum(s) => Json::String(s),
        Value::Timestamp(unit, t) => Json::String(format_timestamp_micros(to_micros(&unit, t))),
        Value::Date32(days) => Json::String(format_date(days)),
        Value::Time64(unit, t) => Json::String(format_time_micros(to_micros(&unit, t))),
        Value::Blob(b) => Json::String(String::from_utf8_lossy(&b).into_owned()),
        Value::List(items) => Json::Array(items.into_iter().map(scalar_to_json).collect()),
        other => Json::String(format!("{other:?}")),
    }
}

fn to_micros(unit: &TimeUnit, t: i64) -> i64 {
    match unit {
        TimeUnit::Second => t.saturating_mul(1_000_000),
        TimeUnit::Millisecond => t.saturating_mul(1_000),
        TimeUnit::Microsecond => t,
        TimeUnit::Nanosecond => t / 1_000,
    }
}

fn format_timestamp_micros(us: i64) -> String {
    match DateTime::<Utc>::from_timestamp_micros(us) {
        Some(dt) => format_naive(dt.naive_utc()),
        None => us.to_string(),
    }
}

fn format_date(days: i32) -> String {
    // DuckDB DATE is days since the Unix epoch; chrono counts from CE.
    days.checked_add(719_163)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|d| d.to_string())
        .unwrap_or_else(|| days.to_string())
}

fn format_time_micros(us: i64) -> String {
    let secs = (us / 1_000_000).rem_euclid(86_400) as u32;
    let nanos = (us % 1_000_000).unsigned_abs() as u32 * 1_000;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| t.format("%H:%M:%S%.6f").to_string())
        .unwrap_or_else(|| us.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, QueryStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = QueryStore::open(dir.path().join("metrics.duckdb")).expect("open store");
        (dir, store)
    }

    fn sample(cpu: f64) -> MetricSample {
        MetricSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            cpu_percent: cpu,
            memory_percent: 42.0,
            memory_mb: 1024.0,
        }
    }

    #[test]
    fn append_then_count() {
        let (_dir, store) = open_temp();
        for i in 0..5 {
            store.append(&sample(i as f64)).expect("append");
        }
        let result = store
            .execute("SELECT COUNT(*) AS n FROM system_metrics")
            .expect("count");
        assert_eq!(result.columns, vec!["n"]);
        assert_eq!(result.rows, vec![vec![json!(5)]]);
    }

    #[test]
    fn columns_follow_projection_order() {
        let (_dir, store) = open_temp();
        store.append(&sample(12.5)).expect("append");
        let result = store
            .execute("SELECT memory_mb, cpu_percent FROM system_metrics")
            .expect("select");
        assert_eq!(result.columns, vec!["memory_mb", "cpu_percent"]);
        assert_eq!(result.rows, vec![vec![json!(1024.0), json!(12.5)]]);
    }

    #[test]
    fn timestamp_serializes_as_iso8601() {
        let (_dir, store) = open_temp();
        store.append(&sample(1.0)).expect("append");
        let result = store
            .execute("SELECT timestamp FROM system_metrics")
            .expect("select");
        assert_eq!(result.rows, vec![vec![json!("2024-01-02T03:04:05.000000")]]);
    }

    #[test]
    fn bad_sql_errors_and_store_stays_usable() {
        let (_dir, store) = open_temp();
        let err = store.execute("SELEC 1").expect_err("must fail");
        assert!(matches!(err, QueryError::Execute(_)));
        let result = store.execute("SELECT 1 AS one").expect("still usable");
        assert_eq!(result.columns, vec!["one"]);
        assert_eq!(result.rows, vec![vec![json!(1)]]);
    }

    #[test]
    fn empty_result_still_reports_columns() {
        let (_dir, store) = open_temp();
        let result = store
            .execute("SELECT * FROM system_metrics WHERE 1 = 0")
            .expect("select");
        assert_eq!(
            result.columns,
            vec!["timestamp", "cpu_percent", "memory_percent", "memory_mb"]
        );
        assert!(result.rows.is_empty());
    }

    #[test]
    fn ddl_and_dml_pass_through() {
        let (_dir, store) = open_temp();
        store
            .execute("CREATE TABLE scratch AS SELECT 7 AS x")
            .expect("ddl");
        let result = store.execute("SELECT x FROM scratch").expect("select");
        assert_eq!(result.rows, vec![vec![json!(7)]]);
    }

    #[test]
    fn data_persists_across_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("metrics.duckdb");
        {
            let store = QueryStore::open(&path).expect("open");
            store.append(&sample(3.0)).expect("append");
        }
        let store = QueryStore::open(&path).expect("reopen");
        let result = store
            .execute("SELECT COUNT(*) AS n FROM system_metrics")
            .expect("count");
        assert_eq!(result.rows, vec![vec![json!(1)]]);
    }
}
