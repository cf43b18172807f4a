//! Three-phase listing cleanup sweep.
//!
//! Invoked once per external trigger (cron hits the CLI or the admin
//! endpoint). The caller is expected to serialize invocations; the sweep
//! itself takes no cross-invocation lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::assets::{object_key_from_public_url, AssetStore};
use super::domain::{display_title, CleanupSummary, ListingId, WarnCandidate};
use super::notify::{ExpiryNotice, ExpiryNotifier};
use super::store::{ListingStore, StoreError};

/// Warnings go out during the 29th day of a listing's life, one day before
/// the active-expiry phase would pick it up.
pub const EXPIRY_WARNING_DAYS_LEFT: u32 = 1;

/// Coordinates the warning, sold-expiry, and active-expiry phases over the
/// record store and the best-effort mail and object-storage collaborators.
pub struct CleanupSweep {
    store: Arc<dyn ListingStore>,
    notifier: Arc<dyn ExpiryNotifier>,
    assets: Arc<dyn AssetStore>,
    public_base_url: Option<String>,
}

impl CleanupSweep {
    pub fn new(
        store: Arc<dyn ListingStore>,
        notifier: Arc<dyn ExpiryNotifier>,
        assets: Arc<dyn AssetStore>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            assets,
            public_base_url,
        }
    }

    /// Run one full sweep against the current wall clock.
    pub async fn run(&self) -> Result<CleanupSummary, CleanupError> {
        self.run_at(Utc::now()).await
    }

    /// Run one full sweep classifying every record against `now`.
    ///
    /// Phase counts reflect records selected, not records successfully
    /// processed; a per-record failure is logged and skipped so one bad row
    /// cannot stall its siblings. A failing selection query aborts the sweep.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CleanupSummary, CleanupError> {
        let warned = self.warn_phase(now).await?;

        let sold = self.store.sold_expired(now).await?;
        let deleted_sold = self.delete_phase(&sold, "sold-expiry").await;

        let active = self.store.active_expired(now).await?;
        let deleted_active = self.delete_phase(&active, "active-expiry").await;

        let summary = CleanupSummary {
            warned,
            deleted_sold,
            deleted_active,
        };
        info!(
            warned = summary.warned,
            deleted_sold = summary.deleted_sold,
            deleted_active = summary.deleted_active,
            "listing cleanup sweep finished"
        );
        Ok(summary)
    }

    async fn warn_phase(&self, now: DateTime<Utc>) -> Result<u64, CleanupError> {
        let candidates = self.store.warn_candidates(now).await?;
        for candidate in &candidates {
            if let Err(err) = self.warn_listing(candidate, now).await {
                warn!(
                    listing = %candidate.id,
                    %err,
                    "warning-phase record failed; continuing with remaining listings"
                );
            }
        }
        Ok(candidates.len() as u64)
    }

    async fn warn_listing(
        &self,
        candidate: &WarnCandidate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.store.owner_email(candidate.owner_id).await? {
            Some(email) => {
                let notice = ExpiryNotice {
                    recipient: email,
                    listing_title: display_title(&candidate.title).to_string(),
                    days_left: EXPIRY_WARNING_DAYS_LEFT,
                };
                if let Err(err) = self.notifier.send_expiry_warning(notice).await {
                    // Delivery is best-effort and the gateway keeps its own
                    // record of failed attempts; the sweep only logs.
                    warn!(listing = %candidate.id, %err, "expiry warning not delivered");
                }
            }
            None => {
                // Still marked below. Without the tombstone, a listing whose
                // owner has no reachable email would be re-selected on every
                // future sweep. Intentional: such listings count as warned
                // even though no mail ever went out.
                info!(
                    listing = %candidate.id,
                    "listing owner has no email; marking warned without notifying"
                );
            }
        }

        self.store.mark_expiry_warned(candidate.id, now).await
    }

    async fn delete_phase(&self, ids: &[ListingId], phase: &'static str) -> u64 {
        for id in ids {
            if let Err(err) = self.delete_with_asset_cleanup(*id).await {
                warn!(
                    listing = %id,
                    phase,
                    %err,
                    "deletion failed; continuing with remaining listings"
                );
            }
        }
        ids.len() as u64
    }

    /// Delete a listing, attempting image deletion first.
    ///
    /// The image URL is re-read rather than carried over from the selection
    /// query so a URL changed since selection is not acted on. Asset
    /// deletion never blocks record deletion, and the whole procedure is
    /// safe to retry on an already-deleted id.
    async fn delete_with_asset_cleanup(&self, id: ListingId) -> Result<(), StoreError> {
        if let Some(url) = self.store.image_url(id).await? {
            let key = self
                .public_base_url
                .as_deref()
                .and_then(|base| object_key_from_public_url(base, &url));
            if let Some(key) = key {
                if let Err(err) = self.assets.delete_object(&key).await {
                    warn!(listing = %id, key = %key, %err, "asset deletion failed; deleting record anyway");
                }
            }
        }

        self.store.delete_listing(id).await
    }
}

/// Sweep-level failure: a phase selection query could not be executed.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
