use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    ids::{InvitationId, SiteId, UserId},
    invitation::InvitationRecord,
    membership::{MembershipRecord, SiteRole},
};

#[derive(Debug, Clone)]
pub struct CreateInvitationParams {
    pub id: InvitationId,
    pub site_id: SiteId,
    pub email: String,
    pub role: SiteRole,
    pub inviter_id: Option<UserId>,
    pub created_at: i64,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord>;
    async fn fetch_invitation(&self, invitation_id: &str) -> Result<Option<InvitationRecord>>;
    async fn list_invitations_for_email(&self, email: &str) -> Result<Vec<InvitationRecord>>;
    async fn list_invitations_for_site(&self, site_id: &str) -> Result<Vec<InvitationRecord>>;
    /// Converts the invitation into a membership and deletes it in one
    /// transaction. An existing higher role is kept. Returns `None` if
    /// another request consumed the invitation first.
    async fn accept_invitation(
        &self,
        invitation: &InvitationRecord,
        user_id: &UserId,
        accepted_at: i64,
    ) -> Result<Option<MembershipRecord>>;
    async fn delete_invitation(&self, invitation_id: &str) -> Result<bool>;
}

pub type InvitationRepositoryRef = Arc<dyn InvitationRepository>;
