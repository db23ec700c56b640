//! Domain records persisted by the ledger.
//!
//! # Invariants
//! - A member is identified by a stable, caller-chosen `member_id`.
//! - Committed balances are never negative.

pub mod member;
