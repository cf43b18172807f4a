use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::domain::{ListingId, UserId, WarnCandidate};
use super::store::{ListingStore, StoreError};
use crate::config::DatabaseConfig;

/// Postgres-backed [`ListingStore`].
///
/// Cutoff instants are computed in Rust from the sweep clock and bound as
/// parameters, so the selections stay consistent within one sweep and the
/// predicates stay testable without a database clock.
#[derive(Debug, Clone)]
pub struct PostgresListingStore {
    pool: PgPool,
}

impl PostgresListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a store over a lazily connected pool; the first query performs
    /// the actual connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&config.url)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl ListingStore for PostgresListingStore {
    async fn warn_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WarnCandidate>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, owner_id FROM listings \
             WHERE COALESCE(status, 'active') <> 'sold' \
               AND expiry_warned_at IS NULL \
               AND created_at <= $1 \
               AND created_at > $2",
        )
        .bind(now - Duration::days(29))
        .bind(now - Duration::days(30))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|row| {
                Ok(WarnCandidate {
                    id: ListingId(row.try_get("id").map_err(map_sqlx)?),
                    title: row
                        .try_get::<Option<String>, _>("title")
                        .map_err(map_sqlx)?
                        .unwrap_or_default(),
                    owner_id: UserId(row.try_get("owner_id").map_err(map_sqlx)?),
                })
            })
            .collect()
    }

    async fn sold_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM listings \
             WHERE COALESCE(status, 'active') = 'sold' \
               AND sold_at IS NOT NULL \
               AND sold_at <= $1",
        )
        .bind(now - Duration::days(7))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|row| Ok(ListingId(row.try_get("id").map_err(map_sqlx)?)))
            .collect()
    }

    async fn active_expired(&self, now: DateTime<Utc>) -> Result<Vec<ListingId>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM listings \
             WHERE COALESCE(status, 'active') <> 'sold' \
               AND created_at <= $1",
        )
        .bind(now - Duration::days(30))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|row| Ok(ListingId(row.try_get("id").map_err(map_sqlx)?)))
            .collect()
    }

    async fn owner_email(&self, owner: UserId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT email FROM users WHERE id = $1")
            .bind(owner.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("email")
                .map_err(map_sqlx)
                .map(|email| email.filter(|value| !value.trim().is_empty())),
            None => Ok(None),
        }
    }

    async fn mark_expiry_warned(
        &self,
        id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE listings SET expiry_warned_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn image_url(&self, id: ListingId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT image_url FROM listings WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => row
                .try_get::<Option<String>, _>("image_url")
                .map_err(map_sqlx),
            None => Ok(None),
        }
    }

    async fn delete_listing(&self, id: ListingId) -> Result<(), StoreError> {
        // Zero affected rows means the listing was already gone; that is fine.
        sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
