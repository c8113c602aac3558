//! Error types for the shift-assignment engine
//!
//! `Rejection` carries the precise reason an assignment entry failed
//! validation. `RosterError` is the taxonomy every engine operation
//! returns; the API layer maps it onto HTTP statuses.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Why a single assignment entry was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Publisher {0} not found or inactive")]
    PublisherNotFound(Uuid),

    #[error("{name} is not available for this shift")]
    Unavailable { name: String },

    #[error("{name} is not registered as part of a couple")]
    NotPaired { name: String },

    #[error("partner_id is required for a couple assignment")]
    MissingPartner,

    #[error("{first} and {second} are not a registered couple")]
    PairMismatch { first: String, second: String },

    #[error("{name} is not registered as a minor")]
    NotMinor { name: String },

    #[error("guardian_id is required for a minor assignment")]
    MissingGuardian,

    #[error("Guardian {0} not found or inactive")]
    GuardianNotFound(Uuid),

    #[error("{name} cannot act as guardian for {minor}")]
    GuardianNotAdult { minor: String, name: String },

    #[error("Publisher {0} appears more than once in the same assignment")]
    DuplicatePublisher(Uuid),
}

impl Rejection {
    /// True when the entry referenced a publisher that does not resolve
    pub fn is_not_found(&self) -> bool {
        matches!(self, Rejection::PublisherNotFound(_) | Rejection::GuardianNotFound(_))
    }
}

/// Engine error taxonomy
#[derive(Error, Debug)]
pub enum RosterError {
    /// Unknown publisher, shift, day or availability record
    #[error("Not found: {0}")]
    NotFound(String),

    /// An assignment entry failed validation; the whole batch is refused
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// Malformed or incomplete request
    #[error("{0}")]
    Validation(String),

    #[error("Capacity exceeded: {capacity} slots available, {requested} requested")]
    CapacityExceeded { capacity: u32, requested: u32 },

    #[error("Shift {0} is locked")]
    Locked(Uuid),

    /// Concurrent write detected; re-fetch and resubmit
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage did not answer in time; retryable
    ///
    /// `None` when no pooled connection became free before the pool's own
    /// acquire deadline.
    #[error("{}", describe_timeout(.0))]
    Timeout(Option<Duration>),

    /// Storage or transport failure
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_timeout(limit: &Option<Duration>) -> String {
    match limit {
        Some(limit) => format!("Operation timed out after {:?}", limit),
        None => "Timed out waiting for a database connection".to_string(),
    }
}

impl RosterError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, RosterError::Conflict(_) | RosterError::Timeout(_))
    }
}

/// SQLite primary result codes for a contended database
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}

impl From<sqlx::Error> for RosterError {
    fn from(err: sqlx::Error) -> Self {
        if is_contention(&err) {
            RosterError::Conflict(format!("database busy: {}", err))
        } else if matches!(err, sqlx::Error::PoolTimedOut) {
            RosterError::Timeout(None)
        } else {
            RosterError::Internal(err.to_string())
        }
    }
}

impl From<poc_common::Error> for RosterError {
    fn from(err: poc_common::Error) -> Self {
        match err {
            poc_common::Error::Database(e) => e.into(),
            poc_common::Error::NotFound(msg) => RosterError::NotFound(msg),
            poc_common::Error::InvalidInput(msg) => RosterError::Validation(msg),
            other => RosterError::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type for engine operations
pub type Result<T> = std::result::Result<T, RosterError>;
