use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{ListingId, UserId, WarnCandidate};

/// Storage abstraction over listing and user records so the cleanup engine
/// can be exercised in isolation.
///
/// Selections take the sweep's wall-clock time rather than reading the
/// database clock, so one sweep classifies every record against a single
/// instant.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Unsold listings that have never been warned and whose age is in the
    /// half-open window `[29 days, 30 days)` at `now`.
    async fn warn_candidates(&self, now: DateTime<Utc>)
        -> Result<Vec<WarnCandidate>, StoreError>;

    /// Sold listings whose `sold_at` is at least 7 days before `now`.
    async fn sold_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError>;

    /// Unsold listings created at least 30 days before `now`, warned or not.
    async fn active_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError>;

    /// Contact address of a listing owner; owners may have none.
    async fn owner_email(&self, owner: UserId) -> Result<Option<String>, StoreError>;

    /// Record that the expiry warning for `id` was processed at `now`. The
    /// mark is one-way; the warning selection never picks the row up again.
    async fn mark_expiry_warned(
        &self,
        id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Current image locator of a listing, read fresh at deletion time.
    /// `None` when the listing has no image or no longer exists.
    async fn image_url(&self, id: ListingId) -> Result<Option<String>, StoreError>;

    /// Remove the listing row. Deleting an id that is already gone is a
    /// no-op.
    async fn delete_listing(&self, id: ListingId) -> Result<(), StoreError>;
}

/// Error enumeration for record-store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("listing store unavailable: {0}")]
    Unavailable(String),
    #[error("listing store query failed: {0}")]
    Query(String),
}
