use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::{
    db::{
        Database,
        invitation_repo::{CreateInvitationParams, InvitationRepositoryRef},
    },
    ids::{InvitationId, SiteId, UserId},
    membership::{MembershipRecord, SiteRole},
    time::now_millis,
    user::{UserRecord, normalize_email},
};

/// A pending offer of site membership. Accepting or revoking removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationRecord {
    pub id: InvitationId,
    pub site_id: SiteId,
    pub email: String,
    pub role: SiteRole,
    pub inviter_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InvitationStore {
    invitation_repo: InvitationRepositoryRef,
}

impl InvitationStore {
    pub fn new(database: &Database) -> Self {
        Self {
            invitation_repo: database.repositories().invitation_repo(),
        }
    }

    /// Fails with a unique violation when the email already holds an
    /// invitation for the site.
    pub async fn create(
        &self,
        site_id: &str,
        email: &str,
        role: SiteRole,
        inviter_id: Option<&str>,
    ) -> Result<InvitationRecord> {
        let email = normalize_email(email);
        if email.is_empty() {
            bail!("invitation email must not be empty");
        }

        self.invitation_repo
            .create_invitation(CreateInvitationParams {
                id: InvitationId::generate(),
                site_id: SiteId::from(site_id),
                email,
                role,
                inviter_id: inviter_id.map(UserId::from),
                created_at: now_millis(),
            })
            .await
    }

    pub async fn find(&self, id: &str) -> Result<Option<InvitationRecord>> {
        self.invitation_repo.fetch_invitation(id).await
    }

    pub async fn list_for_email(&self, email: &str) -> Result<Vec<InvitationRecord>> {
        self.invitation_repo
            .list_invitations_for_email(&normalize_email(email))
            .await
    }

    pub async fn list_for_site(&self, site_id: &str) -> Result<Vec<InvitationRecord>> {
        self.invitation_repo.list_invitations_for_site(site_id).await
    }

    /// Turns the invitation into a membership for `user`.
    ///
    /// Returns `Ok(None)` when the invitation no longer exists.
    pub async fn accept(
        &self,
        invitation_id: &str,
        user: &UserRecord,
    ) -> Result<Option<MembershipRecord>> {
        let Some(invitation) = self.find(invitation_id).await? else {
            return Ok(None);
        };

        if invitation.email != normalize_email(&user.email) {
            bail!("invitation {invitation_id} was not issued to {}", user.email);
        }

        self.invitation_repo
            .accept_invitation(&invitation, &user.id, now_millis())
            .await
    }

    pub async fn revoke(&self, invitation_id: &str) -> Result<bool> {
        self.invitation_repo.delete_invitation(invitation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::errors::is_unique_violation,
        membership::MembershipStore,
        test_support::{seed_site, seed_user, setup_database},
    };

    #[tokio::test]
    async fn create_rejects_second_invitation_for_same_email() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let invitations = InvitationStore::new(&database);

        let invitation = invitations
            .create(&site.id, "Guest@Example.com", SiteRole::Viewer, Some(&owner.id))
            .await
            .expect("create invitation");
        assert_eq!(invitation.email, "guest@example.com");
        assert_eq!(invitation.inviter_id.as_ref(), Some(&owner.id));

        let err = invitations
            .create(&site.id, "guest@example.com", SiteRole::Admin, None)
            .await
            .expect_err("duplicate invitation");
        assert!(is_unique_violation(&err));

        let listed = invitations.list_for_email("GUEST@example.com").await.unwrap();
        assert_eq!(listed, vec![invitation]);
    }

    #[tokio::test]
    async fn accept_creates_membership_and_consumes_invitation() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let guest = seed_user(&database, "guest@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let invitations = InvitationStore::new(&database);

        let invitation = invitations
            .create(&site.id, &guest.email, SiteRole::Admin, Some(&owner.id))
            .await
            .unwrap();

        let membership = invitations
            .accept(&invitation.id, &guest)
            .await
            .expect("accept")
            .expect("membership created");
        assert_eq!(membership.role, SiteRole::Admin);
        assert_eq!(membership.user_id, guest.id);

        assert_eq!(invitations.find(&invitation.id).await.unwrap(), None);
        assert_eq!(
            MembershipStore::new(&database)
                .find_role(&site.id, &guest.id)
                .await
                .unwrap(),
            Some(SiteRole::Admin)
        );

        assert_eq!(invitations.accept(&invitation.id, &guest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn accept_never_lowers_an_existing_role() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let member = seed_user(&database, "member@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let invitations = InvitationStore::new(&database);
        let memberships = MembershipStore::new(&database);
        memberships
            .add_member(&site.id, &member.id, SiteRole::Viewer)
            .await
            .unwrap();

        let demotion = invitations
            .create(&site.id, &owner.email, SiteRole::Viewer, Some(&member.id))
            .await
            .unwrap();
        let membership = invitations
            .accept(&demotion.id, &owner)
            .await
            .unwrap()
            .expect("invitation consumed");
        assert_eq!(membership.role, SiteRole::Owner);

        let promotion = invitations
            .create(&site.id, &member.email, SiteRole::Admin, Some(&owner.id))
            .await
            .unwrap();
        let membership = invitations
            .accept(&promotion.id, &member)
            .await
            .unwrap()
            .expect("invitation consumed");
        assert_eq!(membership.role, SiteRole::Admin);

        let roles: Vec<SiteRole> = memberships
            .list_members(&site.id)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.role)
            .collect();
        assert_eq!(roles, vec![SiteRole::Owner, SiteRole::Admin]);
        assert!(invitations.list_for_site(&site.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_requires_matching_email() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let intruder = seed_user(&database, "intruder@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let invitations = InvitationStore::new(&database);

        let invitation = invitations
            .create(&site.id, "guest@example.com", SiteRole::Viewer, None)
            .await
            .unwrap();

        assert!(invitations.accept(&invitation.id, &intruder).await.is_err());
        assert!(invitations.find(&invitation.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revoke_deletes_invitation() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let invitations = InvitationStore::new(&database);

        let invitation = invitations
            .create(&site.id, "guest@example.com", SiteRole::Viewer, None)
            .await
            .unwrap();

        assert!(invitations.revoke(&invitation.id).await.unwrap());
        assert!(!invitations.revoke(&invitation.id).await.unwrap());
        assert!(invitations.list_for_site(&site.id).await.unwrap().is_empty());
    }
}
