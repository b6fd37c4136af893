use crate::error::{issued_code_from_columns, map_sqlx_error};
use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};
use tally_core::code::SequenceCode;
use tally_core::error::{Result, StorageError};
use tally_core::repository::{IssuedCode, NewIssuedCode, QaStatus, ReadRepository, Repository};

const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

const SCHEMA: [&str; 2] = [
    include_str!("../ddl/mysql/code_counter.sql"),
    include_str!("../ddl/mysql/issued_codes.sql"),
];

/// MySQL implementation of the repository contract.
///
/// `reserve_next` locks the counter row with `SELECT ... FOR UPDATE` inside a
/// transaction, so concurrent reservations queue behind each other instead of
/// reading the same `last_code`. Lock wait timeouts and deadlocks surface as
/// `StorageError::Contention`.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
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
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn is_contention(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|db| matches!(db.number(), ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK))
}

fn classify(err: sqlx::Error) -> StorageError {
    if is_contention(&err) {
        StorageError::Contention(err.to_string())
    } else {
        map_sqlx_error(err)
    }
}

fn decode_row(row: &MySqlRow) -> Result<IssuedCode> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let created_by: String = row.try_get("created_by").map_err(map_sqlx_error)?;
    let code_number: String = row.try_get("code_number").map_err(map_sqlx_error)?;
    let qa_status: String = row.try_get("qa_status").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    issued_code_from_columns(id, created_by, &code_number, &qa_status, created_at)
}

fn inserted_id(last_insert_id: u64) -> Result<i64> {
    i64::try_from(last_insert_id).map_err(|_| {
        StorageError::InvalidData(format!("insert id {} out of range", last_insert_id))
    })
}

#[async_trait]
impl ReadRepository for MySqlRepository {
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
            LIMIT 1
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
impl Repository for MySqlRepository {
    async fn reserve_next(&self, created_by: &str) -> Result<IssuedCode> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Bootstraps the counter; an existing row is left untouched.
        sqlx::query(
            r#"
            INSERT INTO code_counter (id, last_code)
            VALUES (1, ?)
            ON DUPLICATE KEY UPDATE id = id
            "#,
        )
        .bind(SequenceCode::ZERO.to_string())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let last_code: String =
            sqlx::query_scalar("SELECT last_code FROM code_counter WHERE id = 1 FOR UPDATE")
                .fetch_one(&mut *tx)
                .await
                .map_err(classify)?;
        let next = SequenceCode::parse(&last_code)?.next();
        let created_at = Timestamp::now().as_second();

        let result = sqlx::query(
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
        .map_err(classify)?;
        let id = inserted_id(result.last_insert_id())?;

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

        let result = sqlx::query(
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
        .map_err(classify)?;
        let id = inserted_id(result.last_insert_id())?;

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
            VALUES (1, ?) AS incoming
            ON DUPLICATE KEY UPDATE last_code = incoming.last_code
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

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // MySQL reports changed rows, so an unchanged status also yields zero.
        let exists = sqlx::query("SELECT 1 FROM issued_codes WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .is_some();

        Ok(exists)
    }
}
