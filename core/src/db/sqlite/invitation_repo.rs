use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::invitation_repo::{CreateInvitationParams, InvitationRepository},
    ids::{InvitationId, SiteId, UserId},
    invitation::InvitationRecord,
    membership::{MembershipRecord, SiteRole},
    time::from_millis,
};

const INVITATION_COLUMNS: &str = "id, site_id, email, role, inviter_id, created_at";

fn role_rank(column: &str) -> String {
    format!("CASE {column} WHEN 'owner' THEN 2 WHEN 'admin' THEN 1 ELSE 0 END")
}

pub struct SqliteInvitationRepository {
    pool: Pool<Sqlite>,
}

impl SqliteInvitationRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> Result<InvitationRecord> {
        let role: String = row.get("role");
        Ok(InvitationRecord {
            id: row.get::<InvitationId, _>("id"),
            site_id: row.get::<SiteId, _>("site_id"),
            email: row.get("email"),
            role: SiteRole::parse(&role).ok_or_else(|| anyhow!("unknown site role `{role}`"))?,
            inviter_id: row.get::<Option<UserId>, _>("inviter_id"),
            created_at: from_millis(row.get("created_at")),
        })
    }
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepository {
    async fn create_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord> {
        let CreateInvitationParams {
            id,
            site_id,
            email,
            role,
            inviter_id,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO invitations (id, site_id, email, role, inviter_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&site_id)
        .bind(&email)
        .bind(role.as_str())
        .bind(inviter_id.as_ref())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(InvitationRecord {
            id,
            site_id,
            email,
            role,
            inviter_id,
            created_at: from_millis(created_at),
        })
    }

    async fn fetch_invitation(&self, invitation_id: &str) -> Result<Option<InvitationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = ?"
        ))
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::map_row).transpose()
    }

    async fn list_invitations_for_email(&self, email: &str) -> Result<Vec<InvitationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE email = ? ORDER BY created_at, id"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn list_invitations_for_site(&self, site_id: &str) -> Result<Vec<InvitationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE site_id = ? ORDER BY created_at, id"
        ))
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn accept_invitation(
        &self,
        invitation: &InvitationRecord,
        user_id: &UserId,
        accepted_at: i64,
    ) -> Result<Option<MembershipRecord>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM invitations WHERE id = ?")
            .bind(&invitation.id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // Accepting never lowers an existing role, so an owner stays owner.
        sqlx::query(&format!(
            "INSERT INTO site_memberships (site_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(site_id, user_id) DO UPDATE SET role = excluded.role
             WHERE {} < {}",
            role_rank("site_memberships.role"),
            role_rank("excluded.role"),
        ))
        .bind(&invitation.site_id)
        .bind(user_id)
        .bind(invitation.role.as_str())
        .bind(accepted_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            "SELECT role, created_at FROM site_memberships WHERE site_id = ? AND user_id = ?",
        )
        .bind(&invitation.site_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let role: String = row.get("role");
        Ok(Some(MembershipRecord {
            site_id: invitation.site_id.clone(),
            user_id: user_id.clone(),
            role: SiteRole::parse(&role).ok_or_else(|| anyhow!("unknown site role `{role}`"))?,
            created_at: from_millis(row.get("created_at")),
        }))
    }

    async fn delete_invitation(&self, invitation_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = ?")
            .bind(invitation_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
