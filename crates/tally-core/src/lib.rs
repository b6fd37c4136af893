//! Core types and traits for Tally.
//!
//! This crate provides the sequential code type, the ledger data model,
//! the storage traits implemented by `tally-storage`, the ledger audit and
//! the test-case numbering scheme shared by the issuer and its callers.

pub mod audit;
pub mod code;
pub mod error;
pub mod issuer;
pub mod numbering;
pub mod repository;

pub use audit::AuditReport;
pub use code::SequenceCode;
pub use error::{CoreError, IssueError, NumberingError, StorageError};
pub use issuer::{AuditPolicy, CodeIssuer};
pub use repository::{IssuedCode, NewIssuedCode, QaStatus, ReadRepository, Repository};
