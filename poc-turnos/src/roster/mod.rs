//! Shift-assignment engine
//!
//! - [`validator`]: checks each proposed entry against the directory and
//!   availability ledger and computes its slot cost
//! - [`committer`]: runs validation and the capacity check inside one
//!   transaction and replaces the slot's assignment set atomically
//! - [`suggester`]: proposes a fairness-ordered assignment for a slot
//! - [`grouping`]: groups available publishers for manual assignment

pub mod committer;
pub mod grouping;
pub mod suggester;
pub mod validator;

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, RosterError};

/// Engine tunables, resolved from configuration at startup
#[derive(Debug, Clone, Copy)]
pub struct RosterSettings {
    /// Upper bound for any single engine operation against storage
    pub db_timeout: Duration,
    /// Trailing window used for fairness scores
    pub fairness_window_days: u32,
    /// Capacity of slots created without an explicit one
    pub default_capacity: u32,
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            db_timeout: Duration::from_millis(5000),
            fairness_window_days: 30,
            default_capacity: 3,
        }
    }
}

/// Run `op` with a deadline, surfacing expiry as a retryable `Timeout`
///
/// Dropping the future on expiry drops any open transaction, which sqlx
/// rolls back before the connection is reused.
pub(crate) async fn with_timeout<T, F>(limit: Duration, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| RosterError::Timeout(Some(limit)))?
}
