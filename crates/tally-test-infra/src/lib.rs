//! Disposable databases for Tally integration tests.

pub mod error;
pub mod mysql;
pub mod sqlite;

pub use error::{Result, TestInfraError};
