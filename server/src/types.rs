// Request and response types for REST API handlers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statwell_core::{
    invitation::InvitationRecord,
    membership::{MembershipRecord, SiteRole},
    pagination::Page,
    site::SiteRecord,
    site_list::{InvitationSummary, ListEntry, SiteSummary},
    site_preference::SitePreference,
};

// ========== Request Types ==========

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListSitesQuery {
    #[serde(default)]
    pub(crate) page: Option<i64>,
    #[serde(default)]
    pub(crate) page_size: Option<i64>,
    #[serde(default)]
    pub(crate) filter_by_domain: Option<String>,
    #[serde(default)]
    pub(crate) invitations: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSiteRequest {
    pub(crate) domain: String,
    #[serde(default)]
    pub(crate) timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetPreferenceRequest {
    #[serde(default)]
    pub(crate) value: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateInvitationRequest {
    pub(crate) email: String,
    pub(crate) role: SiteRole,
}

// ========== Response Types ==========

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SiteSummaryResponse {
    pub(crate) id: String,
    pub(crate) domain: String,
    pub(crate) timezone: String,
}

impl From<SiteSummary> for SiteSummaryResponse {
    fn from(site: SiteSummary) -> Self {
        Self {
            id: site.id.into_inner(),
            domain: site.domain,
            timezone: site.timezone,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationSummaryResponse {
    pub(crate) id: String,
    pub(crate) role: SiteRole,
    pub(crate) inviter_id: Option<String>,
    pub(crate) inviter_email: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<InvitationSummary> for InvitationSummaryResponse {
    fn from(invitation: InvitationSummary) -> Self {
        Self {
            id: invitation.id.into_inner(),
            role: invitation.role,
            inviter_id: invitation.inviter_id.map(|id| id.into_inner()),
            inviter_email: invitation.inviter_email,
            created_at: invitation.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub(crate) enum ListEntryResponse {
    Invitation {
        site: SiteSummaryResponse,
        invitation: InvitationSummaryResponse,
    },
    PinnedSite {
        site: SiteSummaryResponse,
        role: Option<SiteRole>,
        pinned_at: DateTime<Utc>,
    },
    Site {
        site: SiteSummaryResponse,
        role: Option<SiteRole>,
    },
}

impl From<ListEntry> for ListEntryResponse {
    fn from(entry: ListEntry) -> Self {
        match entry {
            ListEntry::Invitation { site, invitation } => Self::Invitation {
                site: site.into(),
                invitation: invitation.into(),
            },
            ListEntry::PinnedSite {
                site,
                role,
                pinned_at,
            } => Self::PinnedSite {
                site: site.into(),
                role,
                pinned_at,
            },
            ListEntry::Site { site, role } => Self::Site {
                site: site.into(),
                role,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SiteListPageResponse {
    pub(crate) entries: Vec<ListEntryResponse>,
    pub(crate) page_number: u32,
    pub(crate) page_size: u32,
    pub(crate) total_entries: u64,
    pub(crate) total_pages: u64,
}

impl From<Page<ListEntry>> for SiteListPageResponse {
    fn from(page: Page<ListEntry>) -> Self {
        let page = page.map(ListEntryResponse::from);
        Self {
            entries: page.entries,
            page_number: page.page_number,
            page_size: page.page_size,
            total_entries: page.total_entries,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SitePreferenceResponse {
    pub(crate) site_id: String,
    pub(crate) pinned: bool,
    pub(crate) pinned_at: Option<DateTime<Utc>>,
}

impl From<SitePreference> for SitePreferenceResponse {
    fn from(preference: SitePreference) -> Self {
        Self {
            pinned: preference.is_pinned(),
            site_id: preference.site_id.into_inner(),
            pinned_at: preference.pinned_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsStartDateResponse {
    pub(crate) site_id: String,
    pub(crate) stats_start_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SiteResponse {
    pub(crate) id: String,
    pub(crate) domain: String,
    pub(crate) timezone: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) stats_start_date: Option<NaiveDate>,
}

impl From<SiteRecord> for SiteResponse {
    fn from(site: SiteRecord) -> Self {
        Self {
            id: site.id.into_inner(),
            domain: site.domain,
            timezone: site.timezone,
            created_at: site.created_at,
            stats_start_date: site.stats_start_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationResponse {
    pub(crate) id: String,
    pub(crate) site_id: String,
    pub(crate) email: String,
    pub(crate) role: SiteRole,
    pub(crate) inviter_id: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<InvitationRecord> for InvitationResponse {
    fn from(invitation: InvitationRecord) -> Self {
        Self {
            id: invitation.id.into_inner(),
            site_id: invitation.site_id.into_inner(),
            email: invitation.email,
            role: invitation.role,
            inviter_id: invitation.inviter_id.map(|id| id.into_inner()),
            created_at: invitation.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MembershipResponse {
    pub(crate) site_id: String,
    pub(crate) user_id: String,
    pub(crate) role: SiteRole,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<MembershipRecord> for MembershipResponse {
    fn from(membership: MembershipRecord) -> Self {
        Self {
            site_id: membership.site_id.into_inner(),
            user_id: membership.user_id.into_inner(),
            role: membership.role,
            created_at: membership.created_at,
        }
    }
}
