//! Assignment validation
//!
//! Each proposed entry is resolved against the publisher directory and the
//! availability ledger for the target shift's (date, label). The first
//! failing entry rejects the whole batch.

use chrono::NaiveDate;
use poc_common::{AssignmentEntry, Category, Publisher};
use serde::Deserialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::{availability, publishers};
use crate::error::{Rejection, Result};

/// Declared kind of a proposed entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    #[default]
    Solo,
    #[serde(alias = "matrimonio")]
    Couple,
    #[serde(alias = "menor_con_tutor")]
    MinorWithGuardian,
}

/// One proposed entry as submitted by a client
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRequest {
    #[serde(alias = "publicador_id")]
    pub publisher_id: Uuid,
    #[serde(default, alias = "tipo_asignacion")]
    pub kind: AssignmentKind,
    #[serde(default, alias = "publicador2_id")]
    pub partner_id: Option<Uuid>,
    #[serde(default, alias = "tutor_id")]
    pub guardian_id: Option<Uuid>,
}

impl AssignmentRequest {
    pub fn solo(publisher_id: Uuid) -> Self {
        Self {
            publisher_id,
            kind: AssignmentKind::Solo,
            partner_id: None,
            guardian_id: None,
        }
    }

    pub fn couple(publisher_id: Uuid, partner_id: Uuid) -> Self {
        Self {
            publisher_id,
            kind: AssignmentKind::Couple,
            partner_id: Some(partner_id),
            guardian_id: None,
        }
    }

    pub fn minor(publisher_id: Uuid, guardian_id: Uuid) -> Self {
        Self {
            publisher_id,
            kind: AssignmentKind::MinorWithGuardian,
            partner_id: None,
            guardian_id: Some(guardian_id),
        }
    }
}

/// An accepted entry with its slot cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub entry: AssignmentEntry,
    pub slot_cost: u32,
}

/// Validate one entry for the shift at (`date`, `label`)
///
/// Storage failures come back as `Internal`; rule violations as
/// `RosterError::Rejected` with the precise reason.
pub async fn validate(
    conn: &mut SqliteConnection,
    request: &AssignmentRequest,
    date: NaiveDate,
    label: &str,
) -> Result<ValidatedEntry> {
    let publisher = publishers::get_active_publisher(conn, request.publisher_id)
        .await?
        .ok_or(Rejection::PublisherNotFound(request.publisher_id))?;

    ensure_available(conn, &publisher, date, label).await?;

    let entry = match request.kind {
        AssignmentKind::Couple => {
            if publisher.category != Category::Paired {
                return Err(Rejection::NotPaired {
                    name: publisher.name,
                }
                .into());
            }
            let partner_id = request.partner_id.ok_or(Rejection::MissingPartner)?;
            if publisher.pair_id != Some(partner_id) {
                return Err(pair_mismatch(conn, &publisher, partner_id).await?.into());
            }
            let partner = publishers::get_active_publisher(conn, partner_id)
                .await?
                .ok_or(Rejection::PublisherNotFound(partner_id))?;
            if !publisher.is_paired_with(&partner) {
                return Err(Rejection::PairMismatch {
                    first: publisher.name,
                    second: partner.name,
                }
                .into());
            }
            ensure_available(conn, &partner, date, label).await?;

            AssignmentEntry::Couple {
                publisher_id: publisher.id,
                partner_id,
            }
        }
        AssignmentKind::MinorWithGuardian => {
            if publisher.category != Category::Minor {
                return Err(Rejection::NotMinor {
                    name: publisher.name,
                }
                .into());
            }
            let guardian_id = request.guardian_id.ok_or(Rejection::MissingGuardian)?;
            // Guardian availability is checked through the guardian's own entry
            let guardian = publishers::get_active_publisher(conn, guardian_id)
                .await?
                .ok_or(Rejection::GuardianNotFound(guardian_id))?;
            if guardian.id == publisher.id || guardian.category == Category::Minor {
                return Err(Rejection::GuardianNotAdult {
                    minor: publisher.name,
                    name: guardian.name,
                }
                .into());
            }

            AssignmentEntry::MinorWithGuardian {
                publisher_id: publisher.id,
                guardian_id,
            }
        }
        AssignmentKind::Solo => AssignmentEntry::Solo {
            publisher_id: publisher.id,
        },
    };

    Ok(ValidatedEntry {
        slot_cost: entry.slot_cost(),
        entry,
    })
}

async fn ensure_available(
    conn: &mut SqliteConnection,
    publisher: &Publisher,
    date: NaiveDate,
    label: &str,
) -> Result<()> {
    if availability::is_available(conn, publisher.id, date, label).await? {
        Ok(())
    } else {
        Err(Rejection::Unavailable {
            name: publisher.name.clone(),
        }
        .into())
    }
}

/// Build the mismatch reason, naming the supplied partner when it exists
async fn pair_mismatch(
    conn: &mut SqliteConnection,
    publisher: &Publisher,
    partner_id: Uuid,
) -> Result<Rejection> {
    let second = publishers::get_publisher(conn, partner_id)
        .await?
        .map(|p| p.name)
        .unwrap_or_else(|| partner_id.to_string());

    Ok(Rejection::PairMismatch {
        first: publisher.name.clone(),
        second,
    })
}
