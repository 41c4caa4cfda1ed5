use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::membership::{MembershipRecord, SiteRole};

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn upsert_member(
        &self,
        site_id: &str,
        user_id: &str,
        role: SiteRole,
        created_at: i64,
    ) -> Result<()>;
    async fn delete_member(&self, site_id: &str, user_id: &str) -> Result<bool>;
    async fn find_member_role(&self, site_id: &str, user_id: &str) -> Result<Option<SiteRole>>;
    async fn list_members(&self, site_id: &str) -> Result<Vec<MembershipRecord>>;
}

pub type MembershipRepositoryRef = Arc<dyn MembershipRepository>;
