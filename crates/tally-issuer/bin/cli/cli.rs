use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use tally_core::numbering::ExistingCase;
use tally_core::AuditPolicy;

pub const STORAGE_BACKEND_ENV: &str = "TALLY_STORAGE_BACKEND";
pub const SQLITE_PATH_ENV: &str = "TALLY_SQLITE_PATH";
pub const SQLITE_BUSY_TIMEOUT_MS_ENV: &str = "TALLY_SQLITE_BUSY_TIMEOUT_MS";
pub const MYSQL_DSN_ENV: &str = "TALLY_MYSQL_DSN";
pub const MAX_RETRIES_ENV: &str = "TALLY_MAX_RETRIES";
pub const RETRY_DELAY_MS_ENV: &str = "TALLY_RETRY_DELAY_MS";
pub const AUDIT_POLICY_ENV: &str = "TALLY_AUDIT_POLICY";
pub const LOG_FORMAT_ENV: &str = "TALLY_LOG_FORMAT";

pub const DEFAULT_SQLITE_PATH: &str = "tally.db";
pub const DEFAULT_SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "sqlite")]
    Sqlite,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Sqlite => write!(f, "sqlite"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuditPolicyArg {
    #[value(name = "inline")]
    Inline,
    #[value(name = "deferred")]
    Deferred,
}

impl From<AuditPolicyArg> for AuditPolicy {
    fn from(arg: AuditPolicyArg) -> Self {
        match arg {
            AuditPolicyArg::Inline => AuditPolicy::Inline,
            AuditPolicyArg::Deferred => AuditPolicy::Deferred,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tally", about = "Issue and audit sequential codes")]
pub struct CLI {
    #[arg(
        long,
        global = true,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Sqlite
    )]
    pub storage: StorageBackendArg,

    #[arg(long, global = true, env = SQLITE_PATH_ENV, default_value = DEFAULT_SQLITE_PATH)]
    pub sqlite_path: PathBuf,

    #[arg(
        long,
        global = true,
        env = SQLITE_BUSY_TIMEOUT_MS_ENV,
        default_value_t = DEFAULT_SQLITE_BUSY_TIMEOUT_MS
    )]
    pub sqlite_busy_timeout_ms: u64,

    #[arg(long, global = true, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Attempts per contended storage operation, the first one included.
    #[arg(long, global = true, env = MAX_RETRIES_ENV, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    #[arg(long, global = true, env = RETRY_DELAY_MS_ENV, default_value_t = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,

    #[arg(
        long,
        global = true,
        env = AUDIT_POLICY_ENV,
        value_enum,
        default_value_t = AuditPolicyArg::Inline
    )]
    pub audit_policy: AuditPolicyArg,

    #[arg(
        long,
        global = true,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Issue one or more codes.
    Issue {
        #[arg(long, value_parser = non_blank)]
        requester: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Audit one ledger row, or report on the whole ledger.
    Audit {
        /// Stamp the verdict onto this row.
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// List the ledger.
    Ledger {
        #[arg(long)]
        json: bool,
    },
    /// Number a new test case against the cases already recorded for a task.
    CaseNumber(CaseNumberArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CaseNumberArgs {
    #[arg(long)]
    pub task: String,
    #[arg(long)]
    pub build_version: String,
    #[arg(long)]
    pub project: String,
    #[arg(long)]
    pub scenario: String,
    #[arg(long)]
    pub expected: String,
    /// An existing case, as `<test case id>|<scenario>|<expected result>`.
    #[arg(long = "existing", value_parser = existing_case)]
    pub existing: Vec<ExistingCase>,
    #[arg(long)]
    pub json: bool,
}

fn non_blank(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("must not be blank".to_string());
    }
    Ok(value.to_string())
}

fn existing_case(value: &str) -> Result<ExistingCase, String> {
    let mut parts = value.splitn(3, '|');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(test_case_id), Some(scenario), Some(expected_result)) => Ok(ExistingCase {
            test_case_id: test_case_id.to_string(),
            scenario: scenario.to_string(),
            expected_result: expected_result.to_string(),
        }),
        _ => Err("expected <test case id>|<scenario>|<expected result>".to_string()),
    }
}
