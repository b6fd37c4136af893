mod cli;

use crate::cli::{CaseNumberArgs, Command, LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use jiff::Zoned;
use serde_json::json;
use std::time::Duration;
use tally_core::numbering::{format_test_case_id, next_number};
use tally_core::{AuditReport, CodeIssuer, ReadRepository, Repository};
use tally_issuer::{IssuerService, RetryPolicy};
use tally_storage::{InMemoryRepository, MySqlRepository, SqliteOptions, SqliteRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    // numbering needs no storage
    if let Command::CaseNumber(args) = &config.command {
        return case_number(args);
    }

    info!(
        storage_backend = %config.storage,
        max_retries = config.max_retries,
        retry_delay_ms = config.retry_delay_ms,
        "starting tally"
    );

    match config.storage {
        StorageBackendArg::InMemory => run(InMemoryRepository::new(), config).await,
        StorageBackendArg::Sqlite => {
            let options = SqliteOptions::builder()
                .busy_timeout(Duration::from_millis(config.sqlite_busy_timeout_ms))
                .build();
            let repository = SqliteRepository::open(&config.sqlite_path, options)
                .await
                .with_context(|| format!("opening {}", config.sqlite_path.display()))?;
            repository.ensure_schema().await?;
            run(repository, config).await
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn).await?;
            repository.ensure_schema().await?;
            run(repository, config).await
        }
    }
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

async fn run<R: Repository>(repository: R, config: CLI) -> anyhow::Result<()> {
    let retry = RetryPolicy::builder()
        .max_retries(config.max_retries)
        .delay(Duration::from_millis(config.retry_delay_ms))
        .build();
    let service = IssuerService::new(repository)
        .with_retry_policy(retry)
        .with_audit_policy(config.audit_policy.into());

    match config.command {
        Command::Issue { requester, count } => {
            for _ in 0..count {
                let code = service.issue_code(&requester).await?;
                println!("{code}");
            }
        }
        Command::Audit { id: Some(id), json } => {
            let status = service.audit(id).await?;
            if json {
                println!("{}", json!({ "id": id, "qa_status": status }));
            } else {
                println!("{id}\t{status}");
            }
        }
        Command::Audit { id: None, json } => {
            let report = service.audit_ledger().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Ledger { json } => {
            let rows = service.repository().list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        row.id, row.code_number, row.created_by, row.qa_status, row.created_at
                    );
                }
            }
        }
        Command::CaseNumber(args) => case_number(&args)?,
    }

    Ok(())
}

fn case_number(args: &CaseNumberArgs) -> anyhow::Result<()> {
    let number = next_number(&args.existing, &args.scenario, &args.expected)?;
    let test_case_id = format_test_case_id(
        &args.task,
        &args.build_version,
        &args.project,
        number,
        Zoned::now().datetime(),
    );

    if args.json {
        println!(
            "{}",
            json!({ "ts": number.ts, "tc": number.tc, "test_case_id": test_case_id })
        );
    } else {
        println!("{test_case_id}");
    }
    Ok(())
}

fn print_report(report: &AuditReport) {
    println!("verdict:  {}", report.verdict());
    println!("total:    {}", report.total);
    println!("distinct: {}", report.distinct);
    match report.highest {
        Some(highest) => println!("highest:  {highest}"),
        None => println!("highest:  -"),
    }
    for duplicate in &report.duplicates {
        println!(
            "duplicate {} x{}",
            duplicate.code, duplicate.occurrences
        );
    }
    for gap in &report.gaps {
        println!("missing  {}..={} ({})", gap.first, gap.last, gap.count());
    }
}
