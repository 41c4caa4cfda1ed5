use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::site_preference_repo::SitePreferenceRepository,
    ids::{SiteId, UserId},
    site_preference::SitePreference,
    time::from_millis,
};

/// Counts pins on sites that still exist and are reachable through a
/// membership or super-admin access. Binds: user id, excluded site id,
/// super-admin flag.
const ACCESSIBLE_PINS: &str = "SELECT COUNT(*)
     FROM site_user_preferences p
     JOIN sites s ON s.id = p.site_id
     WHERE p.user_id = ?
       AND p.pinned_at IS NOT NULL
       AND p.site_id != ?
       AND (? = 1 OR EXISTS (
           SELECT 1 FROM site_memberships m
           WHERE m.site_id = p.site_id AND m.user_id = p.user_id
       ))";

pub struct SqliteSitePreferenceRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSitePreferenceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> SitePreference {
        SitePreference {
            user_id: row.get::<UserId, _>("user_id"),
            site_id: row.get::<SiteId, _>("site_id"),
            pinned_at: row.get::<Option<i64>, _>("pinned_at").map(from_millis),
        }
    }
}

#[async_trait]
impl SitePreferenceRepository for SqliteSitePreferenceRepository {
    async fn fetch_preference(
        &self,
        user_id: &UserId,
        site_id: &str,
    ) -> Result<Option<SitePreference>> {
        let row = sqlx::query(
            "SELECT user_id, site_id, pinned_at
             FROM site_user_preferences
             WHERE user_id = ? AND site_id = ?",
        )
        .bind(user_id)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_row))
    }

    async fn has_site_access(
        &self,
        user_id: &UserId,
        site_id: &str,
        super_admin: bool,
    ) -> Result<bool> {
        let accessible: i64 = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM sites s
                 WHERE s.id = ?
                   AND (? = 1 OR EXISTS (
                       SELECT 1 FROM site_memberships m
                       WHERE m.site_id = s.id AND m.user_id = ?
                   ))
             )",
        )
        .bind(site_id)
        .bind(super_admin)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(accessible != 0)
    }

    async fn count_pinned(&self, user_id: &UserId, super_admin: bool) -> Result<u64> {
        // An empty site id excludes nothing.
        let count: i64 = sqlx::query_scalar(ACCESSIBLE_PINS)
            .bind(user_id)
            .bind("")
            .bind(super_admin)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn upsert_pinned_at(
        &self,
        user_id: &UserId,
        site_id: &str,
        pinned_at: Option<i64>,
        updated_at: i64,
    ) -> Result<SitePreference> {
        sqlx::query(
            "INSERT INTO site_user_preferences (user_id, site_id, pinned_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, site_id)
             DO UPDATE SET pinned_at = excluded.pinned_at, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(site_id)
        .bind(pinned_at)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(SitePreference {
            user_id: user_id.clone(),
            site_id: SiteId::from(site_id),
            pinned_at: pinned_at.map(from_millis),
        })
    }

    async fn pin_within_limit(
        &self,
        user_id: &UserId,
        site_id: &str,
        pinned_at: i64,
        limit: u32,
        super_admin: bool,
    ) -> Result<bool> {
        let statement = format!(
            "INSERT INTO site_user_preferences (user_id, site_id, pinned_at, updated_at)
             SELECT ?, ?, ?, ?
             WHERE ({ACCESSIBLE_PINS}) < ?
             ON CONFLICT(user_id, site_id)
             DO UPDATE SET pinned_at = excluded.pinned_at, updated_at = excluded.updated_at"
        );

        let result = sqlx::query(&statement)
            .bind(user_id)
            .bind(site_id)
            .bind(pinned_at)
            .bind(pinned_at)
            .bind(user_id)
            .bind(site_id)
            .bind(super_admin)
            .bind(i64::from(limit))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
