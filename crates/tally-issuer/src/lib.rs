//! Sequential code issuance.
//!
//! This crate provides the issuer service: it reserves the next code through
//! a `tally_core::Repository`, retries storage contention, and audits the
//! ledger after each issuance. Core types are re-exported from `tally_core`.

pub mod retry;
pub mod service;

pub use retry::RetryPolicy;
pub use service::IssuerService;
pub use tally_core::{AuditPolicy, AuditReport, CodeIssuer, IssueError, QaStatus, SequenceCode};
