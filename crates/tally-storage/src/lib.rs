//! Storage backends for the Tally counter and ledger.

mod error;
pub mod memory;
pub mod mysql;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use sqlite::{SqliteOptions, SqliteRepository};
pub use tally_core::error::StorageError;
pub use tally_core::repository::{ReadRepository, Repository};
