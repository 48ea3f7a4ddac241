use intake_core::{yes_no, FormRecord, StoredRecord, Symptoms};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use std::path::Path;

use crate::StoreError;

type RecordRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

const SELECT_RECORDS: &str = "SELECT id, patient_name, dob, date, injection, exercise_therapy, pain, numbness, tingling, burning, tightness FROM ocr_results";

async fn connect(path: &Path, read_only: bool) -> Result<SqliteConnection, StoreError> {
    let conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(!read_only)
        .read_only(read_only)
        .busy_timeout(std::time::Duration::from_secs(5))
        .connect()
        .await?;
    Ok(conn)
}

async fn create_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ocr_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_name TEXT,
            dob TEXT,
            date TEXT,
            injection TEXT,
            exercise_therapy TEXT,
            pain INTEGER,
            numbness INTEGER,
            tingling INTEGER,
            burning INTEGER,
            tightness INTEGER
        )
        "#,
    )
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_record(conn: &mut SqliteConnection, record: &FormRecord) -> Result<i64, sqlx::Error> {
    let s = &record.symptoms;
    let result = sqlx::query(
        "INSERT INTO ocr_results (patient_name, dob, date, injection, exercise_therapy, pain, numbness, tingling, burning, tightness) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&record.patient_name)
    .bind(&record.date_of_birth)
    .bind(&record.visit_date)
    .bind(yes_no::render(record.injection_given))
    .bind(yes_no::render(record.exercise_therapy_given))
    .bind(s.pain)
    .bind(s.numbness)
    .bind(s.tingling)
    .bind(s.burning)
    .bind(s.tightness)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Create the `ocr_results` table if it does not exist yet.
pub async fn ensure_schema(path: &Path) -> Result<(), StoreError> {
    let mut conn = connect(path, false).await?;
    let outcome = create_table(&mut conn).await;
    let closed = conn.close().await;
    outcome?;
    closed?;
    Ok(())
}

/// Append one record as a new row and return its id.
///
/// The connection lives only for this call and is closed on every path,
/// including when schema creation or the insert fails.
pub async fn save_record(path: &Path, record: &FormRecord) -> Result<i64, StoreError> {
    let mut conn = connect(path, false).await?;
    let outcome: Result<i64, sqlx::Error> = async {
        create_table(&mut conn).await?;
        insert_record(&mut conn, record).await
    }
    .await;
    let closed = conn.close().await;

    let id = outcome?;
    closed?;
    tracing::debug!(id, db = %path.display(), "Inserted ocr_results row");
    Ok(id)
}

fn to_stored(r: RecordRow) -> StoredRecord {
    let text = |v: Option<String>| v.unwrap_or_else(|| intake_core::UNKNOWN.to_string());
    StoredRecord {
        id: r.0,
        record: FormRecord {
            patient_name: text(r.1),
            date_of_birth: text(r.2),
            visit_date: text(r.3),
            injection_given: r.4.as_deref().is_some_and(yes_no::parse),
            exercise_therapy_given: r.5.as_deref().is_some_and(yes_no::parse),
            symptoms: Symptoms {
                pain: r.6.unwrap_or(0),
                numbness: r.7.unwrap_or(0),
                tingling: r.8.unwrap_or(0),
                burning: r.9.unwrap_or(0),
                tightness: r.10.unwrap_or(0),
            },
        },
    }
}

async fn fetch_records(path: &Path, sql: &str, binds: &[String]) -> Result<Vec<StoredRecord>, StoreError> {
    let mut conn = connect(path, true).await?;
    let mut query = sqlx::query_as::<_, RecordRow>(sql);
    for value in binds {
        query = query.bind(value);
    }
    let outcome = query.fetch_all(&mut conn).await;
    let closed = conn.close().await;

    let rows = outcome?;
    closed?;
    Ok(rows.into_iter().map(to_stored).collect())
}

pub async fn all_records(path: &Path) -> Result<Vec<StoredRecord>, StoreError> {
    fetch_records(path, &format!("{SELECT_RECORDS} ORDER BY id"), &[]).await
}

/// Rows whose pain severity is strictly greater than `threshold`.
pub async fn records_with_pain_above(path: &Path, threshold: i64) -> Result<Vec<StoredRecord>, StoreError> {
    let mut conn = connect(path, true).await?;
    let outcome = sqlx::query_as::<_, RecordRow>(&format!("{SELECT_RECORDS} WHERE pain > ? ORDER BY id"))
        .bind(threshold)
        .fetch_all(&mut conn)
        .await;
    let closed = conn.close().await;

    let rows = outcome?;
    closed?;
    Ok(rows.into_iter().map(to_stored).collect())
}

/// Rows whose `difficulty_ratings` JSON text contains `"<task>": <level>`.
///
/// The task name is lower-cased with spaces turned into underscores. Stores
/// created by this tool have no such column; that is reported as
/// [`StoreError::MissingColumn`] instead of a raw SQL error.
pub async fn records_with_task_difficulty(
    path: &Path,
    task: &str,
    level: &str,
) -> Result<Vec<StoredRecord>, StoreError> {
    if !has_column(path, "difficulty_ratings").await? {
        return Err(StoreError::MissingColumn("difficulty_ratings".to_string()));
    }
    let task = task.trim().to_lowercase().replace(' ', "_");
    let pattern = format!("%\"{}\": {}%", escape_like(&task), escape_like(level.trim()));
    fetch_records(
        path,
        &format!("{SELECT_RECORDS} WHERE difficulty_ratings LIKE ? ESCAPE '\\' ORDER BY id"),
        &[pattern],
    )
    .await
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

async fn has_column(path: &Path, column: &str) -> Result<bool, StoreError> {
    let mut conn = connect(path, true).await?;
    let outcome = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM pragma_table_info('ocr_results') WHERE name = ?",
    )
    .bind(column)
    .fetch_one(&mut conn)
    .await;
    let closed = conn.close().await;

    let count = outcome?;
    closed?;
    Ok(count > 0)
}

/// Result of an ad-hoc query, every cell rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Run an arbitrary SQL statement over a read-only connection.
///
/// Writes are rejected by SQLite itself since the connection is opened
/// read-only.
pub async fn run_read_only(path: &Path, sql: &str) -> Result<QueryOutput, StoreError> {
    let mut conn = connect(path, true).await?;
    let outcome = sqlx::query(sql).fetch_all(&mut conn).await;
    let closed = conn.close().await;

    let rows = outcome?;
    closed?;

    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows.iter().map(render_row).collect::<Result<_, _>>()?;
    Ok(QueryOutput { columns, rows })
}

fn render_row(row: &SqliteRow) -> Result<Vec<String>, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok("NULL".to_string());
            }
            let kind = raw.type_info().name().to_string();
            Ok(match kind.as_str() {
                "INTEGER" => row.try_get::<i64, _>(i)?.to_string(),
                "REAL" => row.try_get::<f64, _>(i)?.to_string(),
                "BLOB" => format!("<{} bytes>", row.try_get::<Vec<u8>, _>(i)?.len()),
                _ => row.try_get::<String, _>(i)?,
            })
        })
        .collect()
}
