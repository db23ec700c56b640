//! Member (account) record.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Matches the width of the `member_id` column in the original schema.
pub const MEMBER_ID_MAX_CHARS: usize = 10;

/// Account holder and current balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub money: i64,
}

impl Member {
    pub fn new(member_id: impl Into<String>, money: i64) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }

    /// Checks the record before it is inserted.
    ///
    /// # Errors
    /// - `AppError::IllegalState` for an empty or over-long id, or a negative
    ///   balance.
    pub fn validate(&self) -> AppResult<()> {
        if self.member_id.trim().is_empty() {
            return Err(AppError::illegal_state("member_id cannot be empty"));
        }
        if self.member_id.chars().count() > MEMBER_ID_MAX_CHARS {
            return Err(AppError::illegal_state(format!(
                "member_id `{}` exceeds {MEMBER_ID_MAX_CHARS} characters",
                self.member_id
            )));
        }
        if self.money < 0 {
            return Err(AppError::illegal_state(format!(
                "member `{}` cannot be saved with negative balance {}",
                self.member_id, self.money
            )));
        }
        Ok(())
    }
}
