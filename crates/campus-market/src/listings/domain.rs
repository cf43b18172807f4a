use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a listing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub i64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marketplace status of a listing. Rows written before the status column
/// existed have no value; those count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
}

impl ListingStatus {
    pub fn label(self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn from_column(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("sold") => ListingStatus::Sold,
            _ => ListingStatus::Active,
        }
    }
}

/// One listing as held by the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    pub title: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
    pub expiry_warned_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub owner_id: UserId,
}

/// Projection returned by the warning-phase selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnCandidate {
    pub id: ListingId,
    pub title: String,
    pub owner_id: UserId,
}

/// Result of one cleanup sweep; the counts reflect records selected by each
/// phase, not per-record delivery or deletion success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub warned: u64,
    pub deleted_sold: u64,
    pub deleted_active: u64,
}

/// Title as shown in outbound notifications; blank titles get a placeholder.
pub fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        "Untitled listing"
    } else {
        trimmed
    }
}
