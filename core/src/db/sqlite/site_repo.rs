use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::site_repo::{CreateSiteParams, SiteRepository},
    ids::SiteId,
    membership::SiteRole,
    site::SiteRecord,
    time::{format_date, from_millis, parse_date},
};

const SITE_COLUMNS: &str = "id, domain, timezone, created_at, stats_start_date";

pub struct SqliteSiteRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSiteRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> SiteRecord {
        let stats_start_date: Option<String> = row.get("stats_start_date");
        SiteRecord {
            id: row.get::<SiteId, _>("id"),
            domain: row.get("domain"),
            timezone: row.get("timezone"),
            created_at: from_millis(row.get("created_at")),
            stats_start_date: stats_start_date.as_deref().and_then(parse_date),
        }
    }
}

#[async_trait]
impl SiteRepository for SqliteSiteRepository {
    async fn create_site(&self, params: CreateSiteParams) -> Result<SiteRecord> {
        let CreateSiteParams {
            id,
            domain,
            timezone,
            owner_id,
            created_at,
        } = params;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO sites (id, domain, timezone, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&domain)
            .bind(&timezone)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert site {domain}"))?;

        sqlx::query(
            "INSERT INTO site_memberships (site_id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(SiteRole::Owner.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to add owner {owner_id} to site {domain}"))?;

        tx.commit().await?;

        Ok(SiteRecord {
            id,
            domain,
            timezone,
            created_at: from_millis(created_at),
            stats_start_date: None,
        })
    }

    async fn fetch_site(&self, site_id: &str) -> Result<Option<SiteRecord>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?"))
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    async fn fetch_site_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>> {
        let row = sqlx::query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE domain = ?"))
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    async fn delete_site(&self, site_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(site_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_stats_start_date(&self, site_id: &str, date: NaiveDate) -> Result<()> {
        // Only the first writer wins; a concurrent computation yields the same date.
        sqlx::query("UPDATE sites SET stats_start_date = ? WHERE id = ? AND stats_start_date IS NULL")
            .bind(format_date(date))
            .bind(site_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
