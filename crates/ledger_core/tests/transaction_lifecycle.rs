use ledger_core::{
    AppError, ConnectionScope, ConnectionSource, Member, MemberRepository, PooledSource,
    SourceConfig, SqliteMemberRepository, StorageFault, TransactionManager, TransactionTemplate,
    TxState,
};
use rusqlite::limits::Limit;
use rusqlite::TransactionBehavior;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

fn memory_setup() -> (Arc<PooledSource>, TransactionManager, SqliteMemberRepository) {
    let config = SourceConfig {
        connection_timeout_ms: 250,
        ..SourceConfig::default()
    };
    let source = Arc::new(PooledSource::in_memory(config).unwrap());
    let manager = TransactionManager::new(source.clone());
    (source, manager, SqliteMemberRepository::new())
}

fn seed(source: &PooledSource, repo: &SqliteMemberRepository, member: Member) {
    let conn = source.acquire().unwrap();
    repo.save(&conn, &member).unwrap();
    source.release(conn);
}

fn money(source: &PooledSource, repo: &SqliteMemberRepository, member_id: &str) -> i64 {
    let conn = source.acquire().unwrap();
    let member = repo.find_by_id(&conn, member_id).unwrap();
    source.release(conn);
    member.money
}

#[test]
fn commit_persists_and_releases() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));

    let tx = manager.begin().unwrap();
    assert_eq!(tx.state(), TxState::Active);
    repo.update(&tx, "memberA", 4_000).unwrap();
    manager.commit(tx).unwrap();

    assert_eq!(source.in_use(), 0);
    assert_eq!(money(&source, &repo, "memberA"), 4_000);
}

#[test]
fn rollback_discards_pending_work() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));

    let tx = manager.begin().unwrap();
    repo.update(&tx, "memberA", -3_000).unwrap();
    repo.save(&tx, &Member::new("memberB", 1)).unwrap();
    manager.rollback(tx).unwrap();

    assert_eq!(source.in_use(), 0);
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
    let conn = source.acquire().unwrap();
    assert!(matches!(
        repo.find_by_id(&conn, "memberB"),
        Err(AppError::NotFound { .. })
    ));
}

#[test]
fn dropping_an_active_context_rolls_back_and_releases() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));

    {
        let tx = manager.begin().unwrap();
        repo.update(&tx, "memberA", 1).unwrap();
    }

    assert_eq!(source.in_use(), 0);
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
}

#[test]
fn panic_inside_template_rolls_back() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));
    let template = TransactionTemplate::new(manager);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        template.execute(|tx| -> Result<(), AppError> {
            repo.update(tx, "memberA", 0)?;
            panic!("caller cancelled mid-transaction");
        })
    }));
    assert!(outcome.is_err());

    assert_eq!(source.in_use(), 0);
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
}

#[test]
fn template_returns_the_primary_error_unchanged() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));
    let template = TransactionTemplate::new(manager);

    let err = template
        .execute(|tx| {
            repo.update(tx, "memberA", 5)?;
            repo.save(tx, &Member::new("memberA", 5))
        })
        .unwrap_err();

    assert!(matches!(err, AppError::DuplicateKey { .. }));
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
}

#[derive(Debug)]
enum DomainError {
    Rejected(&'static str),
    App(AppError),
}

impl From<AppError> for DomainError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::App(err) => write!(f, "{err}"),
        }
    }
}

#[test]
fn template_passes_domain_errors_through() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));
    let template = TransactionTemplate::new(manager);

    let err = template
        .execute(|tx| -> Result<(), DomainError> {
            repo.update(tx, "memberA", 1)?;
            Err(DomainError::Rejected("audit hold"))
        })
        .unwrap_err();

    assert!(matches!(err, DomainError::Rejected("audit hold")));
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
}

#[test]
fn failed_rollback_does_not_replace_the_primary_error() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));
    let template = TransactionTemplate::new(manager);

    let err = template
        .execute(|tx| -> Result<(), DomainError> {
            repo.update(tx, "memberA", 1)?;
            // `ROLLBACK;` no longer fits, so the rollback statement is refused.
            let _ = tx.connection()?.set_limit(Limit::SQLITE_LIMIT_SQL_LENGTH, 1);
            Err(DomainError::Rejected("audit hold"))
        })
        .unwrap_err();

    assert!(matches!(err, DomainError::Rejected("audit hold")));
    assert_eq!(source.in_use(), 0);

    let conn = source.acquire().unwrap();
    let _ = conn.set_limit(Limit::SQLITE_LIMIT_SQL_LENGTH, 1_000_000);
    assert!(!conn.is_autocommit());
    conn.execute_batch("ROLLBACK;").unwrap();
    source.release(conn);
    assert_eq!(money(&source, &repo, "memberA"), 10_000);
}

#[test]
fn begin_fails_with_connection_error_when_pool_is_exhausted() {
    let (source, manager, _repo) = memory_setup();
    let held = source.acquire().unwrap();

    let err = manager.begin().unwrap_err();
    assert!(matches!(err, AppError::Connection { .. }));
    assert!(err.is_retryable());

    source.release(held);
    let tx = manager.begin().unwrap();
    manager.rollback(tx).unwrap();
}

#[test]
fn bound_connection_is_the_contexts_connection() {
    let (_source, manager, _repo) = memory_setup();
    let tx = manager.begin_with(TransactionBehavior::Deferred).unwrap();

    let via_manager = manager.bound_connection(&tx).unwrap();
    let via_scope = tx.connection().unwrap();
    assert!(std::ptr::eq(via_manager, via_scope));
    assert!(!via_scope.is_autocommit());

    manager.commit(tx).unwrap();
}

#[test]
fn connection_returns_to_autocommit_after_completion() {
    let (source, manager, _repo) = memory_setup();

    let tx = manager.begin().unwrap();
    manager.commit(tx).unwrap();
    let conn = source.acquire().unwrap();
    assert!(conn.is_autocommit());
    source.release(conn);

    let tx = manager.begin().unwrap();
    manager.rollback(tx).unwrap();
    let conn = source.acquire().unwrap();
    assert!(conn.is_autocommit());
}

#[test]
fn commit_failure_reports_unknown_outcome_and_releases() {
    let (source, manager, _repo) = memory_setup();
    let conn = source.acquire().unwrap();
    conn.execute_batch(
        "CREATE TABLE transfer_log (
            member_id TEXT NOT NULL
                REFERENCES member(member_id) DEFERRABLE INITIALLY DEFERRED
        );",
    )
    .unwrap();
    source.release(conn);

    let tx = manager.begin().unwrap();
    tx.connection()
        .unwrap()
        .execute("INSERT INTO transfer_log (member_id) VALUES ('ghost');", [])
        .unwrap();
    let err = manager.commit(tx).unwrap_err();

    assert!(err.is_outcome_unknown());
    assert!(matches!(
        err,
        AppError::Storage {
            fault: StorageFault::CommitOutcomeUnknown,
            ..
        }
    ));
    assert_eq!(source.in_use(), 0);

    let conn = source.acquire().unwrap();
    assert!(conn.is_autocommit());
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM transfer_log;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn uncommitted_changes_are_invisible_to_other_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = SourceConfig {
        max_pool_size: 2,
        ..SourceConfig::default()
    };
    let source = Arc::new(PooledSource::open(dir.path().join("iso.db"), config).unwrap());
    let manager = TransactionManager::new(source.clone());
    let repo = SqliteMemberRepository::new();
    seed(&source, &repo, Member::new("memberA", 10_000));

    let tx = manager.begin().unwrap();
    repo.update(&tx, "memberA", 2_000).unwrap();

    let reader = source.acquire().unwrap();
    assert_eq!(repo.find_by_id(&reader, "memberA").unwrap().money, 10_000);
    source.release(reader);

    manager.commit(tx).unwrap();
    assert_eq!(money(&source, &repo, "memberA"), 2_000);
}

#[test]
fn contexts_move_between_threads() {
    let (source, manager, repo) = memory_setup();
    seed(&source, &repo, Member::new("memberA", 10_000));

    let tx = manager.begin().unwrap();
    let worker = std::thread::spawn(move || {
        let repo = SqliteMemberRepository::new();
        repo.update(&tx, "memberA", 7_000).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        manager.commit(tx).unwrap();
    });
    worker.join().unwrap();

    assert_eq!(money(&source, &repo, "memberA"), 7_000);
}
