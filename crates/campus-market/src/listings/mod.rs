//! Listing lifecycle management.
//!
//! Listings are created and sold elsewhere in the system; this module owns
//! what happens at the end of their life. [`cleanup::CleanupSweep`] walks the
//! store in three phases (warn soon-to-expire listings, delete stale sold
//! listings, delete stale active listings) and coordinates best-effort image
//! deletion with record deletion.

pub mod assets;
pub mod cleanup;
pub mod domain;
pub mod notify;
pub mod postgres;
pub mod store;

pub use assets::{object_key_from_public_url, AssetError, AssetStore, NullAssetStore, S3AssetStore};
pub use cleanup::{CleanupError, CleanupSweep};
pub use domain::{CleanupSummary, ListingId, ListingRecord, ListingStatus, UserId, WarnCandidate};
pub use notify::{ExpiryNotice, ExpiryNotifier, MailGateway, NotifyError};
pub use postgres::PostgresListingStore;
pub use store::{ListingStore, StoreError};
