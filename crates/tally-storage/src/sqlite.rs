use crate::error::{issued_code_from_columns, map_sqlx_error};
use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tally_core::code::SequenceCode;
use tally_core::error::{Result, StorageError};
use tally_core::repository::{IssuedCode, NewIssuedCode, QaStatus, ReadRepository, Repository};
use tracing::debug;
use typed_builder::TypedBuilder;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

const SCHEMA: [&str; 3] = [
    include_str!("../ddl/sqlite/code_counter.sql"),
    include_str!("../ddl/sqlite/issued_codes.sql"),
    include_str!("../ddl/sqlite/issued_codes_code_number_idx.sql"),
];

/// Connection settings for [`SqliteRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct SqliteOptions {
    /// How long a statement waits on a locked database before failing with contention.
    #[builder(default = Duration::from_secs(5))]
    pub busy_timeout: Duration,
    #[builder(default = 5)]
    pub max_connections: u32,
    #[builder(default = true)]
    pub create_if_missing: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// SQLite implementation of the repository contract.
///
/// `reserve_next` opens its transaction with a write (the counter bootstrap
/// upsert), so the database write lock is held before the counter is read and
/// two writers can never derive the same successor. A writer that cannot get
/// the lock within the busy timeout fails with `StorageError::Contention`.
///
/// Each pooled connection to `sqlite::memory:` opens a separate database; use
/// a file, or a single connection, for in-memory databases.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for a `sqlite:` URL with default options.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_options =
            SqliteConnectOptions::from_str(database_url).map_err(map_sqlx_error)?;
        Self::connect_with(connect_options, SqliteOptions::default()).await
    }

    /// Opens a pool for the database file at `path`.
    pub async fn open(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::new().filename(path);
        Self::connect_with(connect_options, options).await
    }

    async fn connect_with(
        connect_options: SqliteConnectOptions,
        options: SqliteOptions,
    ) -> Result<Self> {
        let connect_options = connect_options
            .create_if_missing(options.create_if_missing)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self::new(pool))
    }

    /// Creates the counter and ledger tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_contention(err: &sqlx::Error) -> bool {
    // Extended result codes carry the primary code in the low byte.
    err.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

fn classify(err: sqlx::Error) -> StorageError {
    if is_contention(&err) {
        StorageError::Contention(err.to_string())
    } else {
        map_sqlx_error(err)
    }
}

fn decode_row(row: &SqliteRow) -> Result<IssuedCode> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let created_by: String = row.try_get("created_by").map_err(map_sqlx_error)?;
    let code_number: String = row.try_get("code_number").map_err(map_sqlx_error)?;
    let qa_status: String = row.try_get("qa_status").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    issued_code_from_columns(id, created_by, &code_number, &qa_status, created_at)
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn counter(&self) -> Result<Option<SequenceCode>> {
        let last_code: Option<String> =
            sqlx::query_scalar("SELECT last_code FROM code_counter WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;

        Ok(last_code
            .map(|code| SequenceCode::parse(&code))
            .transpose()?)
    }

    async fn get(&self, id: i64) -> Result<Option<IssuedCode>> {
        let row = sqlx::query(
            r#"
            SELECT id, created_by, code_number, qa_status, created_at
            FROM issued_codes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn list(&self) -> Result<Vec<IssuedCode>> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_by, code_number, qa_status, created_at
            FROM issued_codes
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(decode_row).collect()
    }

    async fn code_numbers(&self) -> Result<Vec<SequenceCode>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT code_number FROM issued_codes")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        codes
            .iter()
            .map(|code| SequenceCode::parse(code).map_err(StorageError::from))
            .collect()
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn reserve_next(&self, created_by: &str) -> Result<IssuedCode> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let bootstrapped = sqlx::query(
            r#"
            INSERT INTO code_counter (id, last_code)
            VALUES (1, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(SequenceCode::ZERO.to_string())
        .execute(&mut *tx)
        .await
        .map_err(classify)?
        .rows_affected()
            > 0;
        if bootstrapped {
            debug!("created code counter");
        }

        let last_code: String =
            sqlx::query_scalar("SELECT last_code FROM code_counter WHERE id = 1")
                .fetch_one(&mut *tx)
                .await
                .map_err(classify)?;
        let next = SequenceCode::parse(&last_code)?.next();
        let created_at = Timestamp::now().as_second();

        let id = sqlx::query(
            r#"
            INSERT INTO issued_codes (created_by, code_number, qa_status, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(created_by)
        .bind(next.to_string())
        .bind(QaStatus::Pending.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?
        .last_insert_rowid();

        sqlx::query("UPDATE code_counter SET last_code = ? WHERE id = 1")
            .bind(next.to_string())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        issued_code_from_columns(
            id,
            created_by.to_owned(),
            &next.to_string(),
            QaStatus::Pending.as_str(),
            created_at,
        )
    }

    async fn append(&self, entry: NewIssuedCode) -> Result<IssuedCode> {
        let created_at = Timestamp::now().as_second();

        let id = sqlx::query(
            r#"
            INSERT INTO issued_codes (created_by, code_number, qa_status, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.created_by)
        .bind(entry.code_number.to_string())
        .bind(entry.qa_status.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?
        .last_insert_rowid();

        issued_code_from_columns(
            id,
            entry.created_by,
            &entry.code_number.to_string(),
            entry.qa_status.as_str(),
            created_at,
        )
    }

    async fn set_counter(&self, last_code: SequenceCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO code_counter (id, last_code)
            VALUES (1, ?)
            ON CONFLICT (id) DO UPDATE SET last_code = excluded.last_code
            "#,
        )
        .bind(last_code.to_string())
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn set_qa_status(&self, id: i64, status: QaStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE issued_codes SET qa_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }
}
