//! Database models
//!
//! Publishers reference each other (partner, guardian) by id only; the
//! records live in the `publishers` table and are resolved on demand.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Publisher category
///
/// Legacy clients send `solo`, `matrimonio` and `menor`; both spellings
/// are accepted on input, the English form is stored and returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    #[serde(alias = "solo")]
    Individual,
    #[serde(alias = "matrimonio")]
    Paired,
    #[serde(alias = "menor")]
    Minor,
}

impl Category {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Individual => "individual",
            Category::Paired => "paired",
            Category::Minor => "minor",
        }
    }

    /// Parse database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "individual" | "solo" => Some(Category::Individual),
            "paired" | "matrimonio" => Some(Category::Paired),
            "minor" | "menor" => Some(Category::Minor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    /// Registered partner; mutual when category is `Paired`
    pub pair_id: Option<Uuid>,
    /// Only meaningful when category is `Minor`
    pub guardian_id: Option<Uuid>,
    pub active: bool,
}

impl Publisher {
    /// True when this publisher and `other` reference each other as partners
    pub fn is_paired_with(&self, other: &Publisher) -> bool {
        self.category == Category::Paired
            && other.category == Category::Paired
            && self.pair_id == Some(other.id)
            && other.pair_id == Some(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub id: Uuid,
    pub publisher_id: Uuid,
    pub date: NaiveDate,
    pub shift_label: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDay {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location: String,
}

/// One assignment inside a shift slot's assignment set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentEntry {
    /// Occupies one slot
    Solo { publisher_id: Uuid },
    /// Occupies two slots; both members form a registered pair
    Couple {
        publisher_id: Uuid,
        partner_id: Uuid,
    },
    /// Occupies no slot of its own; rides with the guardian
    MinorWithGuardian {
        publisher_id: Uuid,
        guardian_id: Uuid,
    },
}

impl AssignmentEntry {
    /// Capacity units consumed by this entry
    pub fn slot_cost(&self) -> u32 {
        match self {
            AssignmentEntry::Solo { .. } => 1,
            AssignmentEntry::Couple { .. } => 2,
            AssignmentEntry::MinorWithGuardian { .. } => 0,
        }
    }

    pub fn publisher_id(&self) -> Uuid {
        match self {
            AssignmentEntry::Solo { publisher_id }
            | AssignmentEntry::Couple { publisher_id, .. }
            | AssignmentEntry::MinorWithGuardian { publisher_id, .. } => *publisher_id,
        }
    }

    /// Every publisher id that appears in this entry
    pub fn participants(&self) -> Vec<Uuid> {
        match self {
            AssignmentEntry::Solo { publisher_id } => vec![*publisher_id],
            AssignmentEntry::Couple {
                publisher_id,
                partner_id,
            } => vec![*publisher_id, *partner_id],
            AssignmentEntry::MinorWithGuardian {
                publisher_id,
                guardian_id,
            } => vec![*publisher_id, *guardian_id],
        }
    }

    /// Database `kind` column value
    pub fn kind_str(&self) -> &'static str {
        match self {
            AssignmentEntry::Solo { .. } => "solo",
            AssignmentEntry::Couple { .. } => "couple",
            AssignmentEntry::MinorWithGuardian { .. } => "minor_with_guardian",
        }
    }

    /// Second id column (partner or guardian) for storage
    pub fn companion_id(&self) -> Option<Uuid> {
        match self {
            AssignmentEntry::Solo { .. } => None,
            AssignmentEntry::Couple { partner_id, .. } => Some(*partner_id),
            AssignmentEntry::MinorWithGuardian { guardian_id, .. } => Some(*guardian_id),
        }
    }

    /// Rebuild an entry from its stored columns
    pub fn from_columns(
        kind: &str,
        publisher_id: Uuid,
        companion_id: Option<Uuid>,
    ) -> Result<Self> {
        match (kind, companion_id) {
            ("solo", _) => Ok(AssignmentEntry::Solo { publisher_id }),
            ("couple", Some(partner_id)) => Ok(AssignmentEntry::Couple {
                publisher_id,
                partner_id,
            }),
            ("minor_with_guardian", Some(guardian_id)) => Ok(AssignmentEntry::MinorWithGuardian {
                publisher_id,
                guardian_id,
            }),
            _ => Err(Error::Internal(format!(
                "Malformed assignment row (kind={}, companion={:?})",
                kind, companion_id
            ))),
        }
    }
}

/// A duty period of a shift day with its current assignment set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSlot {
    pub id: Uuid,
    pub day_id: Uuid,
    pub date: NaiveDate,
    pub location: String,
    pub label: String,
    pub capacity: u32,
    pub locked: bool,
    /// Incremented on every assignment mutation
    pub version: i64,
    pub assignments: Vec<AssignmentEntry>,
}

impl ShiftSlot {
    /// Total slot cost of the stored assignment set
    pub fn slots_used(&self) -> u32 {
        self.assignments.iter().map(AssignmentEntry::slot_cost).sum()
    }
}

/// Parse a TEXT id column
pub fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid id '{}': {}", s, e)))
}
