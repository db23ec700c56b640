//! Repository layer: member persistence over a [`crate::tx::ConnectionScope`].
//!
//! # Invariants
//! - Repositories never begin, commit or roll back.
//! - Every driver failure is translated before it leaves this layer.

pub mod member_repo;
