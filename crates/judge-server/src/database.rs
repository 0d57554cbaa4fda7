//! Job/verdict history persistence: ambient plumbing so the facade can
//! serve `GET /submissions/{id}` and `GET /submissions` after the fact.
//! Not "persistence of submissions" as a product feature — no replay,
//! resubmission, or ownership semantics are built on top of these rows.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use harness_core::{Status, Verdict};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

const DATABASE_NAME: &str = "judge.sqlite3";

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs =
        ProjectDirs::from("", "", "judge-server").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await?;

    for pragma_sql in &[
        "PRAGMA busy_timeout = 2000;",
        "PRAGMA journal_mode = WAL;",
        "PRAGMA synchronous = NORMAL;",
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;
    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS submissions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            created_time    TEXT    NOT NULL,
            language        TEXT    NOT NULL,
            source_code     TEXT    NOT NULL,
            status          TEXT    NOT NULL,
            is_match        INTEGER,
            wall_ms         INTEGER NOT NULL,
            compile_ms      INTEGER NOT NULL,
            exit_code       INTEGER NOT NULL
        );",
        "CREATE INDEX IF NOT EXISTS idx_submissions_created_time ON submissions(created_time);",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }
    tx.commit().await?;

    log::info!("initialized database at {}", db_path.as_ref().display());
    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = fs::remove_file(&db_path) {
        log::warn!("unable to remove database at {}: {e}", db_path.as_ref().display());
    } else {
        log::info!("removed database at {}", db_path.as_ref().display());
    }
}

/// Record of one evaluated submission, as returned by `GET /submissions`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmissionRecord {
    pub id: i64,
    pub created_time: String,
    pub language: String,
    pub status: String,
    pub is_match: Option<bool>,
    pub wall_ms: i64,
    pub compile_ms: i64,
    pub exit_code: i64,
}

pub async fn record_submission(
    pool: &SqlitePool,
    language: &str,
    source_code: &str,
    verdict: &Verdict,
) -> sqlx::Result<i64> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let status = serde_json::to_value(verdict.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", verdict.status));

    let result = sqlx::query!(
        r#"
        INSERT INTO submissions
            (created_time, language, source_code, status, is_match, wall_ms, compile_ms, exit_code)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        now,
        language,
        source_code,
        status,
        verdict.is_match,
        verdict.metrics.wall_ms as i64,
        verdict.metrics.compile_ms as i64,
        verdict.exit_code,
    )
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch_submission(pool: &SqlitePool, id: i64) -> sqlx::Result<SubmissionRecord> {
    let row = sqlx::query!(
        r#"
        SELECT id, created_time, language, status, is_match, wall_ms, compile_ms, exit_code
        FROM submissions WHERE id = ?
        "#,
        id
    )
    .fetch_one(pool)
    .await?;

    Ok(SubmissionRecord {
        id: row.id,
        created_time: row.created_time,
        language: row.language,
        status: row.status,
        is_match: row.is_match.map(|m| m != 0),
        wall_ms: row.wall_ms,
        compile_ms: row.compile_ms,
        exit_code: row.exit_code,
    })
}

pub async fn fetch_recent_submissions(
    pool: &SqlitePool,
    limit: i64,
) -> sqlx::Result<Vec<SubmissionRecord>> {
    let rows = sqlx::query!(
        r#"
        SELECT id, created_time, language, status, is_match, wall_ms, compile_ms, exit_code
        FROM submissions ORDER BY created_time DESC LIMIT ?
        "#,
        limit
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SubmissionRecord {
            id: row.id,
            created_time: row.created_time,
            language: row.language,
            status: row.status,
            is_match: row.is_match.map(|m| m != 0),
            wall_ms: row.wall_ms,
            compile_ms: row.compile_ms,
            exit_code: row.exit_code,
        })
        .collect())
}

/// Re-derives a status string's exit-code class for display, reusing
/// `Status::normalize` so the stored free-form column stays interpretable
/// even if written by an older server version.
pub fn normalize_status(raw: &str) -> Option<Status> {
    Status::normalize(raw)
}

pub type DbPool = Arc<SqlitePool>;
