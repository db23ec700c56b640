//! Member repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide `save` / `find_by_id` / `update` / `delete` over `member` rows.
//! - Run against whatever [`ConnectionScope`] the caller passes: the bound
//!   connection of a transaction, or an auto-commit handle.
//!
//! # Invariants
//! - `save` validates the record before any SQL runs.
//! - `update` and `delete` report the affected-row count and treat zero
//!   matches as success.
//! - Only [`AppError`] values cross this boundary.

use crate::db::translate::translate;
use crate::error::{AppError, AppResult};
use crate::model::member::Member;
use crate::tx::ConnectionScope;
use log::{debug, info};
use rusqlite::{params, Row};

const INSERT_SQL: &str = "INSERT INTO member (member_id, money) VALUES (?1, ?2);";
const SELECT_BY_ID_SQL: &str = "SELECT member_id, money FROM member WHERE member_id = ?1;";
const UPDATE_SQL: &str = "UPDATE member SET money = ?1 WHERE member_id = ?2;";
const DELETE_SQL: &str = "DELETE FROM member WHERE member_id = ?1;";

/// Repository interface for member CRUD operations.
pub trait MemberRepository {
    /// Inserts one row and returns the saved record.
    ///
    /// Fails with `DuplicateKey` when the id already exists.
    fn save(&self, scope: &dyn ConnectionScope, member: &Member) -> AppResult<Member>;
    /// Returns exactly one member or `NotFound`.
    fn find_by_id(&self, scope: &dyn ConnectionScope, member_id: &str) -> AppResult<Member>;
    /// Overwrites the balance; returns the number of rows changed.
    fn update(&self, scope: &dyn ConnectionScope, member_id: &str, money: i64)
        -> AppResult<usize>;
    /// Deletes the row; returns the number of rows removed.
    fn delete(&self, scope: &dyn ConnectionScope, member_id: &str) -> AppResult<usize>;
}

/// SQLite-backed member repository. Stateless; the connection comes from the
/// scope passed to each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteMemberRepository;

impl SqliteMemberRepository {
    pub fn new() -> Self {
        Self
    }
}

impl MemberRepository for SqliteMemberRepository {
    fn save(&self, scope: &dyn ConnectionScope, member: &Member) -> AppResult<Member> {
        member.validate()?;
        let conn = scope.connection()?;

        conn.prepare_cached(INSERT_SQL)
            .and_then(|mut stmt| stmt.execute(params![member.member_id, member.money]))
            .map_err(|err| translate("member_save", INSERT_SQL, 2, err))?;

        debug!(
            "event=member_save module=repo status=ok member_id={}",
            member.member_id
        );
        Ok(member.clone())
    }

    fn find_by_id(&self, scope: &dyn ConnectionScope, member_id: &str) -> AppResult<Member> {
        let conn = scope.connection()?;
        let translate_select = |err| translate("member_find", SELECT_BY_ID_SQL, 1, err);

        let mut stmt = conn
            .prepare_cached(SELECT_BY_ID_SQL)
            .map_err(translate_select)?;
        let mut rows = stmt.query(params![member_id]).map_err(translate_select)?;

        let found = match rows.next().map_err(translate_select)? {
            Some(row) => Some(parse_member_row(row).map_err(translate_select)?),
            None => None,
        };
        // Drain the cursor so the statement is reset before it goes back to
        // the cache.
        while rows.next().map_err(translate_select)?.is_some() {}

        found.ok_or_else(|| AppError::not_found(format!("member not found memberId={member_id}")))
    }

    fn update(
        &self,
        scope: &dyn ConnectionScope,
        member_id: &str,
        money: i64,
    ) -> AppResult<usize> {
        let conn = scope.connection()?;
        let affected = conn
            .prepare_cached(UPDATE_SQL)
            .and_then(|mut stmt| stmt.execute(params![money, member_id]))
            .map_err(|err| translate("member_update", UPDATE_SQL, 2, err))?;

        info!("event=member_update module=repo status=ok member_id={member_id} affected_rows={affected}");
        Ok(affected)
    }

    fn delete(&self, scope: &dyn ConnectionScope, member_id: &str) -> AppResult<usize> {
        let conn = scope.connection()?;
        let affected = conn
            .prepare_cached(DELETE_SQL)
            .and_then(|mut stmt| stmt.execute(params![member_id]))
            .map_err(|err| translate("member_delete", DELETE_SQL, 1, err))?;

        info!("event=member_delete module=repo status=ok member_id={member_id} affected_rows={affected}");
        Ok(affected)
    }
}

fn parse_member_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        member_id: row.get("member_id")?,
        money: row.get("money")?,
    })
}
