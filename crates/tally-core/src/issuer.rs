use crate::audit::AuditReport;
use crate::code::SequenceCode;
use crate::repository::QaStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::IssueError>;

/// When the ledger audit runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditPolicy {
    /// Audit the full ledger after every issuance and stamp the new row.
    #[default]
    Inline,
    /// Leave new rows pending; audits run only when explicitly requested.
    Deferred,
}

#[async_trait]
pub trait CodeIssuer: Send + Sync + 'static {
    /// Issues the next sequential code to `requester`.
    async fn issue_code(&self, requester: &str) -> Result<SequenceCode>;

    /// Audits the whole ledger and stamps the verdict onto row `issued_code_id`.
    async fn audit(&self, issued_code_id: i64) -> Result<QaStatus>;

    /// Audits the whole ledger without writing anything.
    async fn audit_ledger(&self) -> Result<AuditReport>;
}
