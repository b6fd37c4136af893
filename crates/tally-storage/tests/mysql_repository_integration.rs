use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use tally_core::{NewIssuedCode, QaStatus, SequenceCode};
use tally_storage::{MySqlRepository, ReadRepository, Repository, StorageError};
use tally_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        Self::start_with(MysqlConfig::builder().build()).await
    }

    async fn start_with(config: MysqlConfig) -> Self {
        let mysql = MySqlServer::new(config).await.expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        let repo = MySqlRepository::new(pool);
        repo.ensure_schema().await.expect("create schema");

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(12)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

#[tokio::test]
async fn reserve_bootstraps_counter_on_empty_store() {
    let fixture = Fixture::start().await;
    assert_eq!(fixture.repo.counter().await.unwrap(), None);

    let row = fixture.repo.reserve_next("alice").await.unwrap();

    assert_eq!(row.code_number.to_string(), "000001");
    assert_eq!(row.created_by, "alice");
    assert_eq!(row.qa_status, QaStatus::Pending);
    assert_eq!(
        fixture.repo.counter().await.unwrap(),
        Some(SequenceCode::new(1))
    );

    let stored = fixture.repo.get(row.id).await.unwrap().unwrap();
    assert_eq!(stored, row);
}

#[tokio::test]
async fn reserve_continues_from_existing_counter() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .set_counter(SequenceCode::parse("000041").unwrap())
        .await
        .unwrap();

    let row = fixture.repo.reserve_next("alice").await.unwrap();

    assert_eq!(row.code_number.to_string(), "000042");
}

#[tokio::test]
async fn concurrent_reservations_never_share_a_code() {
    let fixture = Fixture::start().await;
    fixture.repo.reserve_next("warmup").await.unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let repo = fixture.repo.clone();
        handles.push(tokio::spawn(async move {
            repo.reserve_next(&format!("user-{i}")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut codes: Vec<u64> = fixture
        .repo
        .code_numbers()
        .await
        .unwrap()
        .into_iter()
        .map(SequenceCode::value)
        .collect();
    codes.sort_unstable();

    assert_eq!(codes, (1..=11).collect::<Vec<_>>());
    assert_eq!(
        fixture.repo.counter().await.unwrap(),
        Some(SequenceCode::new(11))
    );
}

#[tokio::test]
async fn append_and_status_updates() {
    let fixture = Fixture::start().await;

    let row = fixture
        .repo
        .append(NewIssuedCode::pending("import", SequenceCode::new(5)))
        .await
        .unwrap();
    assert_eq!(fixture.repo.counter().await.unwrap(), None);

    assert!(fixture
        .repo
        .set_qa_status(row.id, QaStatus::Inconsistent)
        .await
        .unwrap());
    // unchanged value still reports an existing row
    assert!(fixture
        .repo
        .set_qa_status(row.id, QaStatus::Inconsistent)
        .await
        .unwrap());
    assert!(!fixture
        .repo
        .set_qa_status(row.id + 100, QaStatus::Consistent)
        .await
        .unwrap());

    let rows = fixture.repo.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].qa_status, QaStatus::Inconsistent);
}

#[tokio::test]
async fn locked_counter_surfaces_contention() {
    let fixture = Fixture::start_with(MysqlConfig::builder().lock_wait_timeout_secs(1).build()).await;
    fixture.repo.reserve_next("alice").await.unwrap();

    let mut holder = fixture.repo.pool().begin().await.unwrap();
    sqlx::query("SELECT last_code FROM code_counter WHERE id = 1 FOR UPDATE")
        .fetch_one(&mut *holder)
        .await
        .unwrap();

    let err = fixture.repo.reserve_next("bob").await.unwrap_err();
    assert!(matches!(err, StorageError::Contention(_)), "{err:?}");

    holder.rollback().await.unwrap();

    assert_eq!(fixture.repo.list().await.unwrap().len(), 1);
    let row = fixture.repo.reserve_next("bob").await.unwrap();
    assert_eq!(row.code_number.to_string(), "000002");
}
