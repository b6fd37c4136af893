use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tally_core::code::CODE_WIDTH;
use tally_core::{
    AuditPolicy, AuditReport, CodeIssuer, IssueError, QaStatus, Repository, SequenceCode,
    StorageError,
};
use tracing::{debug, info, warn};

/// A concrete implementation of the `CodeIssuer` trait.
///
/// This service wraps a `Repository` and handles:
/// - retrying storage work that failed on contention
/// - the ledger audit after each issuance (see [`AuditPolicy`])
///
/// The repository is responsible for making a reservation atomic. A code
/// whose reservation committed is never issued again, even if its audit
/// fails afterwards.
#[derive(Debug, Clone)]
pub struct IssuerService<R> {
    repository: Arc<R>,
    retry: RetryPolicy,
    audit_policy: AuditPolicy,
}

impl<R: Repository> IssuerService<R> {
    /// Creates a new `IssuerService` with the default retry and audit policies.
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
            retry: RetryPolicy::default(),
            audit_policy: AuditPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_audit_policy(mut self, audit_policy: AuditPolicy) -> Self {
        self.audit_policy = audit_policy;
        self
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Runs `attempt` until it succeeds, fails with anything but contention,
    /// or the retry policy runs out of attempts.
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, IssueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        // at least one attempt, whatever the policy says
        let max_attempts = self.retry.max_retries.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(StorageError::Contention(message)) if attempts >= max_attempts => {
                    warn!(operation, attempts, error = %message, "storage still contended, giving up");
                    return Err(IssueError::ExhaustedRetries {
                        attempts,
                        last_error: message,
                    });
                }
                Err(StorageError::Contention(message)) => {
                    warn!(
                        operation,
                        attempt = attempts,
                        max_attempts,
                        error = %message,
                        "storage contended, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}

#[async_trait]
impl<R: Repository> CodeIssuer for IssuerService<R> {
    async fn issue_code(&self, requester: &str) -> Result<SequenceCode, IssueError> {
        let issued = self
            .with_retries("reserve", || self.repository.reserve_next(requester))
            .await?;
        let code = issued.code_number;

        if code.exceeds_width() {
            warn!(%code, width = CODE_WIDTH, "issued code no longer fits the padded width");
        }
        info!(id = issued.id, %code, requester, "issued code");

        if self.audit_policy == AuditPolicy::Inline {
            match self.audit(issued.id).await {
                Ok(_) => {}
                // the code is committed; a later audit can still stamp the row
                Err(IssueError::ExhaustedRetries {
                    attempts,
                    last_error,
                }) => {
                    warn!(
                        id = issued.id,
                        attempts,
                        error = %last_error,
                        "audit still contended, leaving code pending"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(code)
    }

    async fn audit(&self, issued_code_id: i64) -> Result<QaStatus, IssueError> {
        let report = self.audit_ledger().await?;
        let status = report.verdict();

        let found = self
            .with_retries("stamp audit", || {
                self.repository.set_qa_status(issued_code_id, status)
            })
            .await?;
        if !found {
            return Err(IssueError::NotFound(issued_code_id));
        }

        if status == QaStatus::Inconsistent {
            warn!(
                id = issued_code_id,
                duplicates = report.duplicates.len(),
                missing = report.missing_count(),
                "ledger is inconsistent"
            );
        } else {
            debug!(id = issued_code_id, total = report.total, "ledger is consistent");
        }

        Ok(status)
    }

    async fn audit_ledger(&self) -> Result<AuditReport, IssueError> {
        let codes = self
            .with_retries("scan ledger", || self.repository.code_numbers())
            .await?;
        Ok(AuditReport::from_codes(codes))
    }
}
