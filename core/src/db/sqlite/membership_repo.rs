use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::membership_repo::MembershipRepository,
    ids::{SiteId, UserId},
    membership::{MembershipRecord, SiteRole},
    time::from_millis,
};

pub struct SqliteMembershipRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMembershipRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn parse_role(value: &str) -> Result<SiteRole> {
        SiteRole::parse(value).ok_or_else(|| anyhow!("unknown site role `{value}`"))
    }

    fn map_row(row: SqliteRow) -> Result<MembershipRecord> {
        let role: String = row.get("role");
        Ok(MembershipRecord {
            site_id: row.get::<SiteId, _>("site_id"),
            user_id: row.get::<UserId, _>("user_id"),
            role: Self::parse_role(&role)?,
            created_at: from_millis(row.get("created_at")),
        })
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn upsert_member(
        &self,
        site_id: &str,
        user_id: &str,
        role: SiteRole,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO site_memberships (site_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(site_id, user_id) DO UPDATE SET role = excluded.role",
        )
        .bind(site_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_member(&self, site_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM site_memberships WHERE site_id = ? AND user_id = ?")
            .bind(site_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_member_role(&self, site_id: &str, user_id: &str) -> Result<Option<SiteRole>> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM site_memberships WHERE site_id = ? AND user_id = ?",
        )
        .bind(site_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        role.as_deref().map(Self::parse_role).transpose()
    }

    async fn list_members(&self, site_id: &str) -> Result<Vec<MembershipRecord>> {
        let rows = sqlx::query(
            "SELECT site_id, user_id, role, created_at
             FROM site_memberships
             WHERE site_id = ?
             ORDER BY CASE role WHEN 'owner' THEN 0 ELSE 1 END, created_at, user_id",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
