//! The per-user site directory.
//!
//! Three kinds of rows are merged into one ordered, paginated sequence:
//!
//! 1. invitations addressed to the viewer's email, oldest first;
//! 2. accessible sites the viewer pinned, most recently pinned first;
//! 3. the remaining accessible sites, by domain.
//!
//! Ties inside a tier fall back to the site id. A site that has both a
//! pending invitation and a membership is listed once, as an invitation.
//! The optional domain filter is applied to every tier before paging.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::{
    db::{
        Database,
        site_list_repo::{SiteListQuery, SiteListRepositoryRef},
    },
    ids::{InvitationId, SiteId, UserId},
    membership::SiteRole,
    pagination::{Page, PageLimits, PageRequest, PaginationParams},
    user::Viewer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSummary {
    pub id: SiteId,
    pub domain: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationSummary {
    pub id: InvitationId,
    pub role: SiteRole,
    pub inviter_id: Option<UserId>,
    pub inviter_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the site directory.
///
/// `role` is `None` when the site is only reachable through super-admin
/// access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Invitation {
        site: SiteSummary,
        invitation: InvitationSummary,
    },
    PinnedSite {
        site: SiteSummary,
        role: Option<SiteRole>,
        pinned_at: DateTime<Utc>,
    },
    Site {
        site: SiteSummary,
        role: Option<SiteRole>,
    },
}

impl ListEntry {
    pub fn site(&self) -> &SiteSummary {
        match self {
            ListEntry::Invitation { site, .. }
            | ListEntry::PinnedSite { site, .. }
            | ListEntry::Site { site, .. } => site,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ListEntry::Invitation { .. } => "invitation",
            ListEntry::PinnedSite { .. } => "pinned_site",
            ListEntry::Site { .. } => "site",
        }
    }
}

#[derive(Clone)]
pub struct SiteListStore {
    site_list_repo: SiteListRepositoryRef,
    limits: PageLimits,
}

impl SiteListStore {
    pub fn new(database: &Database, limits: PageLimits) -> Self {
        Self {
            site_list_repo: database.repositories().site_list_repo(),
            limits,
        }
    }

    /// Pinned and plain sites the viewer can access.
    pub async fn list(
        &self,
        viewer: &Viewer,
        params: PaginationParams,
        filter_by_domain: Option<&str>,
    ) -> Result<Page<ListEntry>> {
        self.paginate(viewer, params, filter_by_domain, false).await
    }

    /// Like [`SiteListStore::list`], with the viewer's pending invitations
    /// ranked ahead of every site.
    pub async fn list_with_invitations(
        &self,
        viewer: &Viewer,
        params: PaginationParams,
        filter_by_domain: Option<&str>,
    ) -> Result<Page<ListEntry>> {
        self.paginate(viewer, params, filter_by_domain, true).await
    }

    async fn paginate(
        &self,
        viewer: &Viewer,
        params: PaginationParams,
        filter_by_domain: Option<&str>,
        include_invitations: bool,
    ) -> Result<Page<ListEntry>> {
        let request = PageRequest::resolve(params, self.limits);
        let domain_filter = filter_by_domain
            .map(str::trim)
            .filter(|filter| !filter.is_empty());

        let query = SiteListQuery {
            viewer,
            include_invitations,
            domain_filter,
            limit: request.limit(),
            offset: request.offset(),
        };

        let total_entries = self.site_list_repo.count_entries(&query).await?;
        let entries = if (query.offset as u64) < total_entries {
            self.site_list_repo.fetch_entries(&query).await?
        } else {
            Vec::new()
        };

        Ok(Page::new(entries, request, total_entries))
    }
}
