use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use campus_market::listings::{
    AssetError, AssetStore, CleanupSummary, CleanupSweep, ExpiryNotice, ExpiryNotifier,
    ListingId, ListingRecord, ListingStatus, ListingStore, NotifyError, StoreError, UserId,
    WarnCandidate,
};

const PUBLIC_BASE: &str = "https://img.example.edu/market";

#[derive(Default)]
struct MemoryStore {
    listings: Mutex<HashMap<i64, ListingRecord>>,
    emails: Mutex<HashMap<i64, String>>,
    fail_email_lookup_for: Mutex<HashSet<i64>>,
    fail_image_read_for: Mutex<HashSet<i64>>,
}

impl MemoryStore {
    fn insert(&self, record: ListingRecord) {
        self.listings
            .lock()
            .expect("store mutex poisoned")
            .insert(record.id.0, record);
    }

    fn set_email(&self, owner: UserId, email: &str) {
        self.emails
            .lock()
            .expect("store mutex poisoned")
            .insert(owner.0, email.to_string());
    }

    fn fail_email_lookup(&self, owner: UserId) {
        self.fail_email_lookup_for
            .lock()
            .expect("store mutex poisoned")
            .insert(owner.0);
    }

    fn fail_image_read(&self, id: ListingId) {
        self.fail_image_read_for
            .lock()
            .expect("store mutex poisoned")
            .insert(id.0);
    }

    fn get(&self, id: ListingId) -> Option<ListingRecord> {
        self.listings
            .lock()
            .expect("store mutex poisoned")
            .get(&id.0)
            .cloned()
    }

    fn contains(&self, id: ListingId) -> bool {
        self.get(id).is_some()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn warn_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WarnCandidate>, StoreError> {
        let guard = self.listings.lock().expect("store mutex poisoned");
        let mut candidates: Vec<WarnCandidate> = guard
            .values()
            .filter(|record| {
                record.status != ListingStatus::Sold
                    && record.expiry_warned_at.is_none()
                    && record.created_at <= now - Duration::days(29)
                    && record.created_at > now - Duration::days(30)
            })
            .map(|record| WarnCandidate {
                id: record.id,
                title: record.title.clone(),
                owner_id: record.owner_id,
            })
            .collect();
        candidates.sort_by_key(|candidate| candidate.id.0);
        Ok(candidates)
    }

    async fn sold_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError> {
        let guard = self.listings.lock().expect("store mutex poisoned");
        let mut ids: Vec<ListingId> = guard
            .values()
            .filter(|record| {
                record.status == ListingStatus::Sold
                    && record
                        .sold_at
                        .is_some_and(|sold_at| sold_at <= now - Duration::days(7))
            })
            .map(|record| record.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        Ok(ids)
    }

    async fn active_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError> {
        let guard = self.listings.lock().expect("store mutex poisoned");
        let mut ids: Vec<ListingId> = guard
            .values()
            .filter(|record| {
                record.status != ListingStatus::Sold
                    && record.created_at <= now - Duration::days(30)
            })
            .map(|record| record.id)
            .collect();
        ids.sort_by_key(|id| id.0);
        Ok(ids)
    }

    async fn owner_email(&self, owner: UserId) -> Result<Option<String>, StoreError> {
        if self
            .fail_email_lookup_for
            .lock()
            .expect("store mutex poisoned")
            .contains(&owner.0)
        {
            return Err(StoreError::Query("simulated email lookup failure".into()));
        }
        Ok(self
            .emails
            .lock()
            .expect("store mutex poisoned")
            .get(&owner.0)
            .cloned())
    }

    async fn mark_expiry_warned(
        &self,
        id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(record) = self
            .listings
            .lock()
            .expect("store mutex poisoned")
            .get_mut(&id.0)
        {
            record.expiry_warned_at = Some(now);
        }
        Ok(())
    }

    async fn image_url(&self, id: ListingId) -> Result<Option<String>, StoreError> {
        if self
            .fail_image_read_for
            .lock()
            .expect("store mutex poisoned")
            .contains(&id.0)
        {
            return Err(StoreError::Query("simulated image read failure".into()));
        }
        Ok(self.get(id).and_then(|record| record.image_url))
    }

    async fn delete_listing(&self, id: ListingId) -> Result<(), StoreError> {
        self.listings
            .lock()
            .expect("store mutex poisoned")
            .remove(&id.0);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<ExpiryNotice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<ExpiryNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl ExpiryNotifier for RecordingNotifier {
    async fn send_expiry_warning(&self, notice: ExpiryNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingAssets {
    deleted_keys: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingAssets {
    fn failing() -> Self {
        Self {
            deleted_keys: Mutex::default(),
            fail: true,
        }
    }

    fn deleted_keys(&self) -> Vec<String> {
        self.deleted_keys
            .lock()
            .expect("assets mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl AssetStore for RecordingAssets {
    async fn delete_object(&self, key: &str) -> Result<(), AssetError> {
        if self.fail {
            return Err(AssetError::Backend("simulated storage outage".into()));
        }
        self.deleted_keys
            .lock()
            .expect("assets mutex poisoned")
            .push(key.to_string());
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    assets: Arc<RecordingAssets>,
    sweep: CleanupSweep,
    now: DateTime<Utc>,
}

fn harness() -> Harness {
    harness_with_assets(RecordingAssets::default())
}

fn harness_with_assets(assets: RecordingAssets) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let assets = Arc::new(assets);
    let sweep = CleanupSweep::new(
        store.clone(),
        notifier.clone(),
        assets.clone(),
        Some(PUBLIC_BASE.to_string()),
    );
    Harness {
        store,
        notifier,
        assets,
        sweep,
        now: Utc::now(),
    }
}

fn listing(id: i64, owner: i64, age: Duration, now: DateTime<Utc>) -> ListingRecord {
    ListingRecord {
        id: ListingId(id),
        title: format!("Listing {id}"),
        status: ListingStatus::Active,
        created_at: now - age,
        sold_at: None,
        expiry_warned_at: None,
        image_url: None,
        owner_id: UserId(owner),
    }
}

fn sold_listing(id: i64, owner: i64, sold_days_ago: i64, now: DateTime<Utc>) -> ListingRecord {
    ListingRecord {
        status: ListingStatus::Sold,
        sold_at: Some(now - Duration::days(sold_days_ago)),
        ..listing(id, owner, Duration::days(sold_days_ago + 3), now)
    }
}

#[tokio::test]
async fn warns_once_and_is_idempotent() {
    let h = harness();
    h.store.insert(listing(1, 10, Duration::hours(29 * 24 + 12), h.now));
    h.store.set_email(UserId(10), "a@b.com");

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(
        summary,
        CleanupSummary {
            warned: 1,
            deleted_sold: 0,
            deleted_active: 0
        }
    );

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, "a@b.com");
    assert_eq!(notices[0].days_left, 1);
    assert!(h.store.get(ListingId(1)).expect("still present").expiry_warned_at.is_some());

    // Immediately running again must not re-select anything.
    let second = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(second, CleanupSummary::default());
    assert_eq!(h.notifier.notices().len(), 1);
}

#[tokio::test]
async fn owner_without_email_is_still_tombstoned() {
    let h = harness();
    h.store.insert(listing(1, 10, Duration::days(29) + Duration::hours(1), h.now));

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.warned, 1);
    assert!(h.notifier.notices().is_empty());
    assert!(h.store.get(ListingId(1)).expect("still present").expiry_warned_at.is_some());

    let second = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(second, CleanupSummary::default());
}

#[tokio::test]
async fn blank_title_uses_placeholder_in_notice() {
    let h = harness();
    let mut record = listing(1, 10, Duration::days(29) + Duration::hours(6), h.now);
    record.title = "   ".to_string();
    h.store.insert(record);
    h.store.set_email(UserId(10), "a@b.com");

    h.sweep.run_at(h.now).await.expect("sweep succeeds");
    let notices = h.notifier.notices();
    assert_eq!(notices[0].listing_title, "Untitled listing");
}

#[tokio::test]
async fn listings_outside_warn_window_are_not_selected() {
    let h = harness();
    h.store.insert(listing(1, 10, Duration::days(28), h.now));
    h.store.insert(listing(2, 10, Duration::days(29) - Duration::seconds(1), h.now));
    h.store.set_email(UserId(10), "a@b.com");

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary, CleanupSummary::default());
    assert!(h.notifier.notices().is_empty());
}

#[tokio::test]
async fn sold_listings_are_deleted_after_seven_days() {
    let h = harness();
    h.store.insert(sold_listing(1, 10, 8, h.now));
    h.store.insert(sold_listing(2, 10, 6, h.now));

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.deleted_sold, 1);
    assert!(!h.store.contains(ListingId(1)));
    assert!(h.store.contains(ListingId(2)), "recent sale stays");
}

#[tokio::test]
async fn active_expiry_deletes_regardless_of_prior_warning() {
    let h = harness();
    let mut record = listing(1, 10, Duration::days(40), h.now);
    record.expiry_warned_at = Some(h.now - Duration::days(2));
    h.store.insert(record);

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.deleted_active, 1);
    assert_eq!(summary.warned, 0);
    assert!(!h.store.contains(ListingId(1)));
}

#[tokio::test]
async fn stored_image_is_deleted_with_derived_key() {
    let h = harness();
    let mut record = sold_listing(7, 10, 8, h.now);
    record.image_url = Some(format!("{PUBLIC_BASE}/listings/7.jpg"));
    h.store.insert(record);

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.deleted_sold, 1);
    assert_eq!(h.assets.deleted_keys(), vec!["listings/7.jpg".to_string()]);
    assert!(!h.store.contains(ListingId(7)));
}

#[tokio::test]
async fn foreign_image_url_never_touches_asset_store() {
    let h = harness();
    let mut record = listing(1, 10, Duration::days(31), h.now);
    record.image_url = Some("https://elsewhere.example.com/pic.jpg".to_string());
    h.store.insert(record);

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.deleted_active, 1);
    assert!(h.assets.deleted_keys().is_empty());
    assert!(!h.store.contains(ListingId(1)));
}

#[tokio::test]
async fn asset_failure_does_not_block_record_deletion() {
    let h = harness_with_assets(RecordingAssets::failing());
    let mut record = listing(1, 10, Duration::days(31), h.now);
    record.image_url = Some(format!("{PUBLIC_BASE}/listings/1.jpg"));
    h.store.insert(record);

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(summary.deleted_active, 1);
    assert!(!h.store.contains(ListingId(1)));
}

#[tokio::test]
async fn per_record_failures_do_not_stop_siblings() {
    let h = harness();
    // Two deletion candidates; reading the image of the first fails.
    let mut broken = listing(1, 10, Duration::days(31), h.now);
    broken.image_url = Some(format!("{PUBLIC_BASE}/listings/1.jpg"));
    h.store.insert(broken);
    h.store.insert(listing(2, 10, Duration::days(31), h.now));
    h.store.fail_image_read(ListingId(1));

    // Two warn candidates; the email lookup for the first owner fails.
    h.store.insert(listing(3, 30, Duration::days(29) + Duration::hours(2), h.now));
    h.store.insert(listing(4, 40, Duration::days(29) + Duration::hours(2), h.now));
    h.store.fail_email_lookup(UserId(30));
    h.store.set_email(UserId(40), "ok@example.edu");

    let summary = h.sweep.run_at(h.now).await.expect("sweep succeeds");

    // Counts reflect selection, not per-record success.
    assert_eq!(summary.warned, 2);
    assert_eq!(summary.deleted_active, 2);

    // The healthy sibling in each phase was fully processed.
    assert!(!h.store.contains(ListingId(2)));
    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient, "ok@example.edu");
    assert!(h.store.get(ListingId(4)).expect("present").expiry_warned_at.is_some());

    // The failed records were skipped, not half-processed.
    assert!(h.store.contains(ListingId(1)), "failed delete leaves the row");
    assert!(
        h.store.get(ListingId(3)).expect("present").expiry_warned_at.is_none(),
        "failed email lookup defers the warning to the next sweep"
    );
}

#[tokio::test]
async fn back_to_back_sweeps_are_idempotent_overall() {
    let h = harness();
    h.store.insert(listing(1, 10, Duration::hours(29 * 24 + 12), h.now));
    h.store.set_email(UserId(10), "a@b.com");
    h.store.insert(sold_listing(2, 10, 9, h.now));
    h.store.insert(listing(3, 10, Duration::days(45), h.now));

    let first = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(
        first,
        CleanupSummary {
            warned: 1,
            deleted_sold: 1,
            deleted_active: 1
        }
    );

    let second = h.sweep.run_at(h.now).await.expect("sweep succeeds");
    assert_eq!(second, CleanupSummary::default());
}
