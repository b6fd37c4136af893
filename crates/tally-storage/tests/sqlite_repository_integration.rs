use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tally_core::{NewIssuedCode, QaStatus, SequenceCode};
use tally_storage::{ReadRepository, Repository, SqliteOptions, SqliteRepository, StorageError};
use tally_test_infra::sqlite::SqliteFile;

struct Fixture {
    file: SqliteFile,
    repo: SqliteRepository,
}

impl Fixture {
    async fn start() -> Self {
        Self::start_with(SqliteOptions::default()).await
    }

    async fn start_with(options: SqliteOptions) -> Self {
        let file = SqliteFile::new().expect("temp sqlite file");
        let repo = SqliteRepository::open(file.path(), options)
            .await
            .expect("open sqlite");
        repo.ensure_schema().await.expect("create schema");

        Self { file, repo }
    }
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
    assert_eq!(
        fixture.repo.counter().await.unwrap(),
        Some(SequenceCode::new(42))
    );
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let fixture = Fixture::start().await;
    fixture.repo.reserve_next("alice").await.unwrap();

    fixture.repo.ensure_schema().await.unwrap();

    assert_eq!(fixture.repo.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn data_survives_reopening_the_file() {
    let fixture = Fixture::start().await;
    fixture.repo.reserve_next("alice").await.unwrap();
    fixture.repo.reserve_next("alice").await.unwrap();

    let reopened = SqliteRepository::connect(&fixture.file.database_url())
        .await
        .unwrap();
    let row = reopened.reserve_next("bob").await.unwrap();

    assert_eq!(row.code_number.to_string(), "000003");
}

#[tokio::test]
async fn list_is_ordered_by_id() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .append(NewIssuedCode::pending("import", SequenceCode::new(9)))
        .await
        .unwrap();
    fixture
        .repo
        .append(NewIssuedCode::pending("import", SequenceCode::new(3)))
        .await
        .unwrap();

    let rows = fixture.repo.list().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].id < rows[1].id);
    assert_eq!(rows[0].code_number, SequenceCode::new(9));
    assert_eq!(fixture.repo.counter().await.unwrap(), None);
}

#[tokio::test]
async fn set_qa_status_touches_only_the_given_row() {
    let fixture = Fixture::start().await;
    let first = fixture.repo.reserve_next("alice").await.unwrap();
    let second = fixture.repo.reserve_next("alice").await.unwrap();

    assert!(fixture
        .repo
        .set_qa_status(second.id, QaStatus::Consistent)
        .await
        .unwrap());
    assert!(!fixture
        .repo
        .set_qa_status(second.id + 100, QaStatus::Consistent)
        .await
        .unwrap());

    let first = fixture.repo.get(first.id).await.unwrap().unwrap();
    let second = fixture.repo.get(second.id).await.unwrap().unwrap();
    assert_eq!(first.qa_status, QaStatus::Pending);
    assert_eq!(second.qa_status, QaStatus::Consistent);
}

#[tokio::test]
async fn malformed_code_is_invalid_data() {
    let fixture = Fixture::start().await;
    sqlx::query(
        "INSERT INTO issued_codes (created_by, code_number, qa_status, created_at) VALUES ('x', 'abc', 'Pending', 0)",
    )
    .execute(fixture.repo.pool())
    .await
    .unwrap();

    let err = fixture.repo.code_numbers().await.unwrap_err();

    assert!(matches!(err, StorageError::InvalidData(_)), "{err:?}");
}

#[tokio::test]
async fn foreign_write_lock_surfaces_contention() {
    let fixture = Fixture::start_with(
        SqliteOptions::builder()
            .busy_timeout(Duration::from_millis(50))
            .build(),
    )
    .await;
    fixture.repo.reserve_next("alice").await.unwrap();

    let mut holder = SqliteConnectOptions::new()
        .filename(fixture.file.path())
        .connect()
        .await
        .unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut holder)
        .await
        .unwrap();

    let err = fixture.repo.reserve_next("bob").await.unwrap_err();
    assert!(matches!(err, StorageError::Contention(_)), "{err:?}");

    sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    holder.close().await.unwrap();

    assert_eq!(fixture.repo.list().await.unwrap().len(), 1);
    let row = fixture.repo.reserve_next("bob").await.unwrap();
    assert_eq!(row.code_number.to_string(), "000002");
}

#[tokio::test]
async fn concurrent_reservations_never_share_a_code() {
    let fixture = Fixture::start().await;

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

    assert_eq!(codes, (1..=10).collect::<Vec<_>>());
}
