use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Database, membership_repo::MembershipRepositoryRef},
    ids::{SiteId, UserId},
    time::now_millis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteRole {
    Owner,
    Admin,
    Viewer,
}

impl SiteRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteRole::Owner => "owner",
            SiteRole::Admin => "admin",
            SiteRole::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(SiteRole::Owner),
            "admin" => Some(SiteRole::Admin),
            "viewer" => Some(SiteRole::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub site_id: SiteId,
    pub user_id: UserId,
    pub role: SiteRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MembershipStore {
    membership_repo: MembershipRepositoryRef,
}

impl MembershipStore {
    pub fn new(database: &Database) -> Self {
        Self {
            membership_repo: database.repositories().membership_repo(),
        }
    }

    /// Inserts the membership or replaces the role of an existing one.
    pub async fn add_member(&self, site_id: &str, user_id: &str, role: SiteRole) -> Result<()> {
        self.membership_repo
            .upsert_member(site_id, user_id, role, now_millis())
            .await
    }

    /// Revokes access. Pin preferences are left in place; listings only
    /// surface sites the user can still reach.
    pub async fn remove_member(&self, site_id: &str, user_id: &str) -> Result<bool> {
        self.membership_repo.delete_member(site_id, user_id).await
    }

    pub async fn find_role(&self, site_id: &str, user_id: &str) -> Result<Option<SiteRole>> {
        self.membership_repo.find_member_role(site_id, user_id).await
    }

    pub async fn list_members(&self, site_id: &str) -> Result<Vec<MembershipRecord>> {
        self.membership_repo.list_members(site_id).await
    }
}
