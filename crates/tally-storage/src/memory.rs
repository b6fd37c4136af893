use async_trait::async_trait;
use jiff::Timestamp;
use std::sync::{Arc, Mutex, MutexGuard};
use tally_core::code::SequenceCode;
use tally_core::error::{Result, StorageError};
use tally_core::repository::{IssuedCode, NewIssuedCode, QaStatus, ReadRepository, Repository};
use tracing::debug;

#[derive(Debug, Default)]
struct Ledger {
    counter: Option<SequenceCode>,
    rows: Vec<IssuedCode>,
    last_id: i64,
}

impl Ledger {
    fn push(&mut self, entry: NewIssuedCode) -> IssuedCode {
        self.last_id += 1;
        let row = IssuedCode {
            id: self.last_id,
            created_by: entry.created_by,
            code_number: entry.code_number,
            qa_status: entry.qa_status,
            created_at: Timestamp::now(),
        };
        self.rows.push(row.clone());
        row
    }

    // ids are assigned in push order, so rows stay sorted by id
    fn position(&self, id: i64) -> Option<usize> {
        self.rows.binary_search_by_key(&id, |row| row.id).ok()
    }
}

/// In-memory implementation of the Repository trait.
///
/// The counter and the ledger live behind a single mutex, which makes
/// `reserve_next` atomic. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<Ledger>>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Operation("in-memory ledger lock is poisoned".to_string()))
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn counter(&self) -> Result<Option<SequenceCode>> {
        Ok(self.lock()?.counter)
    }

    async fn get(&self, id: i64) -> Result<Option<IssuedCode>> {
        let ledger = self.lock()?;
        Ok(ledger.position(id).map(|index| ledger.rows[index].clone()))
    }

    async fn list(&self) -> Result<Vec<IssuedCode>> {
        Ok(self.lock()?.rows.clone())
    }

    async fn code_numbers(&self) -> Result<Vec<SequenceCode>> {
        Ok(self.lock()?.rows.iter().map(|row| row.code_number).collect())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn reserve_next(&self, created_by: &str) -> Result<IssuedCode> {
        let mut ledger = self.lock()?;

        let last = *ledger.counter.get_or_insert_with(|| {
            debug!("created code counter");
            SequenceCode::ZERO
        });
        let next = last.next();

        let row = ledger.push(NewIssuedCode::pending(created_by, next));
        ledger.counter = Some(next);

        Ok(row)
    }

    async fn append(&self, entry: NewIssuedCode) -> Result<IssuedCode> {
        Ok(self.lock()?.push(entry))
    }

    async fn set_counter(&self, last_code: SequenceCode) -> Result<()> {
        self.lock()?.counter = Some(last_code);
        Ok(())
    }

    async fn set_qa_status(&self, id: i64, status: QaStatus) -> Result<bool> {
        let mut ledger = self.lock()?;
        let Some(index) = ledger.position(id) else {
            return Ok(false);
        };
        ledger.rows[index].qa_status = status;
        Ok(true)
    }
}
