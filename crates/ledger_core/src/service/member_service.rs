//! Money transfer use-case.
//!
//! # Responsibility
//! - [`MemberService`] holds the business steps and runs them against an
//!   explicitly passed [`TransactionContext`].
//! - [`TransactionalMemberService`] decorates it with the unit-of-work
//!   boundary, so callers get one atomic `account_transfer` entry point.
//!
//! # Invariants
//! - Both balance updates of a transfer commit together or not at all.
//! - The error that aborted a transfer is the error the caller receives.

use crate::config::TransferPolicy;
use crate::db::source::ConnectionSource;
use crate::error::{AppError, AppResult};
use crate::model::member::Member;
use crate::repo::member_repo::MemberRepository;
use crate::tx::{TransactionContext, TransactionManager, TransactionTemplate};
use log::info;
use std::sync::Arc;

/// Transfer business logic without transaction handling.
#[derive(Debug, Clone)]
pub struct MemberService<R: MemberRepository> {
    repo: R,
    policy: TransferPolicy,
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repo: R, policy: TransferPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Moves `money` from `from_id` to `to_id` inside `tx`.
    ///
    /// # Contract
    /// - `money` must be positive and covered by the sender's balance.
    /// - The sender is debited before the target is checked against
    ///   [`TransferPolicy::forbidden_member_id`]; a forbidden target therefore
    ///   exercises the rollback of an already-applied update.
    ///
    /// # Errors
    /// - `NotFound` when either member does not exist.
    /// - `IllegalState` for a non-positive amount, insufficient balance, a
    ///   credit that would overflow the target, a self-transfer, or a
    ///   forbidden target.
    /// - Any repository error, unchanged.
    pub fn account_transfer(
        &self,
        tx: &TransactionContext,
        from_id: &str,
        to_id: &str,
        money: i64,
    ) -> AppResult<()> {
        if money <= 0 {
            return Err(AppError::illegal_state(format!(
                "transfer amount must be positive, got {money}"
            )));
        }
        if from_id == to_id {
            return Err(AppError::illegal_state(format!(
                "cannot transfer from `{from_id}` to itself"
            )));
        }

        let from_member = self.repo.find_by_id(tx, from_id)?;
        let to_member = self.repo.find_by_id(tx, to_id)?;

        if from_member.money < money {
            return Err(AppError::illegal_state(format!(
                "insufficient balance for `{from_id}`: has {}, needs {money}",
                from_member.money
            )));
        }

        let credited = to_member.money.checked_add(money).ok_or_else(|| {
            AppError::illegal_state(format!(
                "balance overflow for `{to_id}`: has {}, receives {money}",
                to_member.money
            ))
        })?;

        self.repo.update(tx, from_id, from_member.money - money)?;
        self.validate_target(&to_member)?;
        self.repo.update(tx, to_id, credited)?;

        info!(
            "event=account_transfer module=service status=ok tx_id={} from={from_id} to={to_id} amount={money}",
            tx.id()
        );
        Ok(())
    }

    fn validate_target(&self, to_member: &Member) -> AppResult<()> {
        if to_member.member_id == self.policy.forbidden_member_id {
            return Err(AppError::illegal_state(format!(
                "exception during transfer to `{}`",
                to_member.member_id
            )));
        }
        Ok(())
    }
}

/// [`MemberService`] wrapped in begin / commit-or-rollback.
#[derive(Debug, Clone)]
pub struct TransactionalMemberService<R: MemberRepository> {
    inner: MemberService<R>,
    template: TransactionTemplate,
}

impl<R: MemberRepository> TransactionalMemberService<R> {
    pub fn new(inner: MemberService<R>, template: TransactionTemplate) -> Self {
        Self { inner, template }
    }

    /// Builds the decorator over `source` with default transaction settings.
    pub fn over_source(repo: R, policy: TransferPolicy, source: Arc<dyn ConnectionSource>) -> Self {
        Self::new(
            MemberService::new(repo, policy),
            TransactionTemplate::new(TransactionManager::new(source)),
        )
    }

    pub fn inner(&self) -> &MemberService<R> {
        &self.inner
    }

    /// Atomic transfer: both updates persist, or neither does.
    pub fn account_transfer(&self, from_id: &str, to_id: &str, money: i64) -> AppResult<()> {
        self.template
            .execute(|tx| self.inner.account_transfer(tx, from_id, to_id, money))
    }

    /// Reads one member in its own short transaction.
    pub fn find_member(&self, member_id: &str) -> AppResult<Member> {
        self.template
            .execute(|tx| self.inner.repository().find_by_id(tx, member_id))
    }
}
