use ledger_core::{
    AppError, ConnectionSource, DriverManagerSource, Member, MemberRepository, PooledSource,
    SourceConfig, SqliteMemberRepository, TransactionManager,
};
use std::sync::Arc;

#[test]
fn crud_roundtrip_in_autocommit_mode() {
    let source = PooledSource::in_memory(SourceConfig::default()).unwrap();
    let repo = SqliteMemberRepository::new();
    let conn = source.acquire().unwrap();

    let member = Member::new("memberV0", 10_000);
    let saved = repo.save(&conn, &member).unwrap();
    assert_eq!(saved, member);

    let found = repo.find_by_id(&conn, &member.member_id).unwrap();
    assert_eq!(found, member);

    assert_eq!(repo.update(&conn, &member.member_id, 20_000).unwrap(), 1);
    let updated = repo.find_by_id(&conn, &member.member_id).unwrap();
    assert_eq!(updated.money, 20_000);

    assert_eq!(repo.delete(&conn, &member.member_id).unwrap(), 1);
    let err = repo.find_by_id(&conn, &member.member_id).unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    source.release(conn);
}

#[test]
fn duplicate_save_fails_and_keeps_existing_row() {
    let source = PooledSource::in_memory(SourceConfig::default()).unwrap();
    let repo = SqliteMemberRepository::new();
    let conn = source.acquire().unwrap();

    repo.save(&conn, &Member::new("memberA", 10_000)).unwrap();
    let err = repo
        .save(&conn, &Member::new("memberA", 1))
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateKey { .. }));
    assert!(!err.is_retryable());

    let existing = repo.find_by_id(&conn, "memberA").unwrap();
    assert_eq!(existing.money, 10_000);
}

#[test]
fn update_and_delete_on_missing_member_are_not_errors() {
    let source = PooledSource::in_memory(SourceConfig::default()).unwrap();
    let repo = SqliteMemberRepository::new();
    let conn = source.acquire().unwrap();

    assert_eq!(repo.update(&conn, "nobody", 500).unwrap(), 0);
    assert_eq!(repo.delete(&conn, "nobody").unwrap(), 0);
    assert!(matches!(
        repo.find_by_id(&conn, "nobody"),
        Err(AppError::NotFound { .. })
    ));
}

#[test]
fn direct_source_sees_rows_written_by_earlier_connections() {
    let dir = tempfile::tempdir().unwrap();
    let source = DriverManagerSource::open(dir.path().join("ledger.db"), SourceConfig::default())
        .unwrap();
    let repo = SqliteMemberRepository::new();

    let writer = source.acquire().unwrap();
    repo.save(&writer, &Member::new("memberB", 700)).unwrap();
    source.release(writer);

    let reader = source.acquire().unwrap();
    assert_eq!(repo.find_by_id(&reader, "memberB").unwrap().money, 700);
}

#[test]
fn repository_calls_inside_a_transaction_share_the_bound_connection() {
    let source = Arc::new(PooledSource::in_memory(SourceConfig::default()).unwrap());
    let manager = TransactionManager::new(source.clone());
    let repo = SqliteMemberRepository::new();

    let tx = manager.begin().unwrap();
    let handle_id = tx.handle_id();
    // The single pooled connection is bound; a second checkout would time out.
    assert_eq!(source.in_use(), 1);

    repo.save(&tx, &Member::new("memberA", 10_000)).unwrap();
    repo.update(&tx, "memberA", 9_000).unwrap();
    assert_eq!(repo.find_by_id(&tx, "memberA").unwrap().money, 9_000);
    assert_eq!(tx.handle_id(), handle_id);

    manager.commit(tx).unwrap();
    assert_eq!(source.in_use(), 0);

    let conn = source.acquire().unwrap();
    assert_eq!(repo.find_by_id(&conn, "memberA").unwrap().money, 9_000);
}
