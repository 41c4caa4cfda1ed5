use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{DateTime, NaiveDate, Utc};
use statwell_core::{
    invitation::{InvitationRecord, InvitationStore},
    membership::{MembershipRecord, MembershipStore, SiteRole},
    pagination::{Page, PaginationParams},
    site::{SiteRecord, SiteStore, normalize_domain},
    site_list::{ListEntry, SiteListStore},
    site_preference::{PreferenceOption, PreferenceValue, SitePreference, SitePreferenceStore},
    user::{UserRecord, Viewer, normalize_email},
};
use tracing::info;

use crate::{AppError, state::AppState};

pub struct SiteService {
    site_store: SiteStore,
    membership_store: MembershipStore,
    invitation_store: InvitationStore,
    preference_store: SitePreferenceStore,
    site_list_store: SiteListStore,
}

impl SiteService {
    pub fn new(
        site_store: SiteStore,
        membership_store: MembershipStore,
        invitation_store: InvitationStore,
        preference_store: SitePreferenceStore,
        site_list_store: SiteListStore,
    ) -> Self {
        Self {
            site_store,
            membership_store,
            invitation_store,
            preference_store,
            site_list_store,
        }
    }

    pub async fn list_sites(
        &self,
        viewer: &Viewer,
        params: PaginationParams,
        filter_by_domain: Option<&str>,
        include_invitations: bool,
    ) -> Result<Page<ListEntry>, AppError> {
        let page = if include_invitations {
            self.site_list_store
                .list_with_invitations(viewer, params, filter_by_domain)
                .await
        } else {
            self.site_list_store
                .list(viewer, params, filter_by_domain)
                .await
        };

        page.map_err(AppError::internal)
    }

    pub async fn create_site(
        &self,
        owner: &UserRecord,
        domain: &str,
        timezone: Option<&str>,
    ) -> Result<SiteRecord, AppError> {
        if normalize_domain(domain).is_empty() {
            return Err(AppError::bad_request("site domain must not be empty"));
        }

        let site = self
            .site_store
            .create(domain, timezone, &owner.id)
            .await
            .map_err(|err| {
                let domain = normalize_domain(domain);
                AppError::from_storage(err, format!("Site {domain} already exists."))
            })?;

        info!(site_id = %site.id, domain = %site.domain, owner_id = %owner.id, "site created");
        Ok(site)
    }

    /// Loads the site when the viewer is a member or a super admin. Sites the
    /// viewer cannot reach are reported as missing.
    pub async fn fetch_accessible_site(
        &self,
        viewer: &Viewer,
        site_id: &str,
    ) -> Result<SiteRecord, AppError> {
        let site = self
            .site_store
            .find_by_id(site_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| AppError::site_not_found(site_id))?;

        if viewer.super_admin || self.role_of(viewer, site_id).await?.is_some() {
            Ok(site)
        } else {
            Err(AppError::site_not_found(site_id))
        }
    }

    pub async fn stats_start_date(
        &self,
        viewer: &Viewer,
        site_id: &str,
    ) -> Result<Option<NaiveDate>, AppError> {
        let site = self.fetch_accessible_site(viewer, site_id).await?;
        self.site_store
            .stats_start_date(&site)
            .await
            .map_err(AppError::internal)
    }

    pub async fn toggle_pin(
        &self,
        viewer: &Viewer,
        site_id: &str,
    ) -> Result<SitePreference, AppError> {
        Ok(self.preference_store.toggle_pin(viewer, site_id).await?)
    }

    pub async fn set_option(
        &self,
        viewer: &Viewer,
        site_id: &str,
        option: &str,
        value: Option<DateTime<Utc>>,
    ) -> Result<SitePreference, AppError> {
        let value = match option.parse::<PreferenceOption>()? {
            PreferenceOption::PinnedAt => PreferenceValue::PinnedAt(value),
        };

        Ok(self
            .preference_store
            .set_option(viewer, site_id, value)
            .await?)
    }

    pub async fn invite(
        &self,
        inviter: &Viewer,
        site_id: &str,
        email: &str,
        role: SiteRole,
    ) -> Result<InvitationRecord, AppError> {
        if normalize_email(email).is_empty() {
            return Err(AppError::bad_request("invitation email must not be empty"));
        }
        if role == SiteRole::Owner {
            return Err(AppError::bad_request("invitations cannot grant ownership"));
        }
        self.ensure_manager(inviter, site_id).await?;

        let invitation = self
            .invitation_store
            .create(site_id, email, role, Some(&inviter.user_id))
            .await
            .map_err(|err| {
                let email = normalize_email(email);
                AppError::from_storage(err, format!("{email} is already invited to Site {site_id}."))
            })?;

        info!(
            site_id,
            invitation_id = %invitation.id,
            role = invitation.role.as_str(),
            "invitation created"
        );
        Ok(invitation)
    }

    pub async fn accept_invitation(
        &self,
        user: &UserRecord,
        invitation_id: &str,
    ) -> Result<MembershipRecord, AppError> {
        let invitation = self.fetch_invitation(invitation_id).await?;
        if invitation.email != normalize_email(&user.email) {
            return Err(AppError::forbidden("invitation was issued to another email"));
        }

        let membership = self
            .invitation_store
            .accept(invitation_id, user)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| AppError::invitation_not_found(invitation_id))?;

        info!(
            site_id = %membership.site_id,
            user_id = %membership.user_id,
            "invitation accepted"
        );
        Ok(membership)
    }

    /// Site managers revoke invitations; the invitee may decline their own.
    pub async fn revoke_invitation(
        &self,
        viewer: &Viewer,
        invitation_id: &str,
    ) -> Result<(), AppError> {
        let invitation = self.fetch_invitation(invitation_id).await?;
        if invitation.email != viewer.email {
            self.ensure_manager(viewer, &invitation.site_id).await?;
        }

        let removed = self
            .invitation_store
            .revoke(invitation_id)
            .await
            .map_err(AppError::internal)?;
        if !removed {
            return Err(AppError::invitation_not_found(invitation_id));
        }

        info!(site_id = %invitation.site_id, invitation_id, "invitation revoked");
        Ok(())
    }

    /// Managers remove other members and anyone may leave a site. Owners
    /// cannot be removed.
    pub async fn remove_member(
        &self,
        viewer: &Viewer,
        site_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        if viewer.user_id.as_str() != user_id {
            self.ensure_manager(viewer, site_id).await?;
        }

        let role = self
            .membership_store
            .find_role(site_id, user_id)
            .await
            .map_err(AppError::internal)?;
        match role {
            None => return Err(AppError::site_not_found(site_id)),
            Some(SiteRole::Owner) => {
                return Err(AppError::forbidden("site owners cannot be removed"));
            }
            Some(_) => {}
        }

        self.membership_store
            .remove_member(site_id, user_id)
            .await
            .map_err(AppError::internal)?;

        info!(site_id, user_id, "membership revoked");
        Ok(())
    }

    async fn fetch_invitation(&self, invitation_id: &str) -> Result<InvitationRecord, AppError> {
        self.invitation_store
            .find(invitation_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| AppError::invitation_not_found(invitation_id))
    }

    async fn role_of(&self, viewer: &Viewer, site_id: &str) -> Result<Option<SiteRole>, AppError> {
        self.membership_store
            .find_role(site_id, &viewer.user_id)
            .await
            .map_err(AppError::internal)
    }

    async fn ensure_manager(&self, viewer: &Viewer, site_id: &str) -> Result<(), AppError> {
        self.fetch_accessible_site(viewer, site_id).await?;
        if viewer.super_admin {
            return Ok(());
        }

        match self.role_of(viewer, site_id).await? {
            Some(SiteRole::Owner | SiteRole::Admin) => Ok(()),
            _ => Err(AppError::site_access_denied(site_id)),
        }
    }
}

impl FromRef<AppState> for Arc<SiteService> {
    fn from_ref(state: &AppState) -> Arc<SiteService> {
        Arc::clone(&state.site_service)
    }
}
