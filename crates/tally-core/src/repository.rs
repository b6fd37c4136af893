use crate::code::SequenceCode;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Outcome of the most recent audit pass for a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QaStatus {
    /// Issued but not audited yet.
    #[serde(rename = "Pending")]
    Pending,
    /// The ledger had no gaps and no duplicates when this row was audited.
    #[serde(rename = "True")]
    Consistent,
    /// The ledger had a gap or a duplicate when this row was audited.
    #[serde(rename = "False")]
    Inconsistent,
}

impl QaStatus {
    /// Returns the stored representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            QaStatus::Pending => "Pending",
            QaStatus::Consistent => "True",
            QaStatus::Inconsistent => "False",
        }
    }
}

impl Display for QaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QaStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(QaStatus::Pending),
            "True" => Ok(QaStatus::Consistent),
            "False" => Ok(QaStatus::Inconsistent),
            other => Err(CoreError::InvalidQaStatus(other.to_string())),
        }
    }
}

/// A row of the issued-code ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCode {
    /// Monotonic surrogate key assigned by the storage backend.
    pub id: i64,
    /// Identity of whoever requested the code.
    pub created_by: String,
    pub code_number: SequenceCode,
    pub qa_status: QaStatus,
    pub created_at: Timestamp,
}

/// A ledger row that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssuedCode {
    pub created_by: String,
    pub code_number: SequenceCode,
    pub qa_status: QaStatus,
}

impl NewIssuedCode {
    /// A pending entry for `code_number` requested by `created_by`.
    pub fn pending(created_by: impl Into<String>, code_number: SequenceCode) -> Self {
        Self {
            created_by: created_by.into(),
            code_number,
            qa_status: QaStatus::Pending,
        }
    }
}

/// A read-only view of the counter and the ledger.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Returns the last issued code, or `None` if the counter was never created.
    async fn counter(&self) -> Result<Option<SequenceCode>>;

    /// Retrieves a ledger row by id.
    async fn get(&self, id: i64) -> Result<Option<IssuedCode>>;

    /// Returns every ledger row ordered by id.
    async fn list(&self) -> Result<Vec<IssuedCode>>;

    /// Returns every code number in the ledger, duplicates included, in no particular order.
    async fn code_numbers(&self) -> Result<Vec<SequenceCode>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Reserves the next code for `created_by` as one atomic unit.
    ///
    /// Creates the counter at [`SequenceCode::ZERO`] if it does not exist,
    /// appends a [`QaStatus::Pending`] row holding the successor of the
    /// counter, and advances the counter to it. Either all of this commits or
    /// nothing does. Returns `Err(Contention)` when another writer holds the lock.
    async fn reserve_next(&self, created_by: &str) -> Result<IssuedCode>;

    /// Appends a row to the ledger without touching the counter.
    async fn append(&self, entry: NewIssuedCode) -> Result<IssuedCode>;

    /// Overwrites the counter, creating it if needed.
    async fn set_counter(&self, last_code: SequenceCode) -> Result<()>;

    /// Updates the audit status of a single row.
    /// Returns `true` if the row exists.
    async fn set_qa_status(&self, id: i64, status: QaStatus) -> Result<bool>;
}
