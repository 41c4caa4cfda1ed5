use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::site_list_repo::{SiteListQuery, SiteListRepository},
    ids::{InvitationId, SiteId, UserId},
    membership::SiteRole,
    site_list::{InvitationSummary, ListEntry, SiteSummary},
    time::from_millis,
};

const TIER_INVITATION: i64 = 0;
const TIER_PINNED: i64 = 1;
const TIER_SITE: i64 = 2;

pub struct SqliteSiteListRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSiteListRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Pushes the `entries` CTE followed by the `FROM entries e JOIN sites s`
    /// clause and the optional domain filter, so the count and page queries
    /// see exactly the same rows.
    fn push_entries(builder: &mut QueryBuilder<'_, Sqlite>, query: &SiteListQuery<'_>) {
        builder.push(
            "WITH invited AS (
                 SELECT i.id, i.site_id, i.role, i.inviter_id, i.created_at
                 FROM invitations i
                 WHERE ",
        );
        if query.include_invitations {
            builder.push("i.email = ");
            builder.push_bind(query.viewer.email.clone());
        } else {
            builder.push("0");
        }

        builder.push(
            "),
             accessible AS (
                 SELECT s.id AS site_id, m.role AS role
                 FROM sites s
                 LEFT JOIN site_memberships m ON m.site_id = s.id AND m.user_id = ",
        );
        builder.push_bind(query.viewer.user_id.clone());
        builder.push(" WHERE m.user_id IS NOT NULL OR ");
        builder.push_bind(query.viewer.super_admin);
        builder.push(" = 1");

        builder.push(format!(
            "),
             entries AS (
                 SELECT {TIER_INVITATION} AS tier,
                        inv.created_at AS tier_key,
                        inv.site_id,
                        inv.role,
                        inv.id AS invitation_id,
                        inv.inviter_id,
                        inv.created_at AS invited_at,
                        NULL AS pinned_at
                 FROM invited inv
                 UNION ALL
                 SELECT CASE WHEN p.pinned_at IS NULL THEN {TIER_SITE} ELSE {TIER_PINNED} END,
                        COALESCE(-p.pinned_at, 0),
                        a.site_id,
                        a.role,
                        NULL,
                        NULL,
                        NULL,
                        p.pinned_at
                 FROM accessible a
                 LEFT JOIN site_user_preferences p
                     ON p.site_id = a.site_id AND p.user_id = "
        ));
        builder.push_bind(query.viewer.user_id.clone());
        builder.push(
            " WHERE a.site_id NOT IN (SELECT site_id FROM invited)
             )
             ",
        );
    }

    fn push_domain_filter(builder: &mut QueryBuilder<'_, Sqlite>, query: &SiteListQuery<'_>) {
        if let Some(filter) = query.domain_filter {
            builder.push(" WHERE s.domain LIKE ");
            builder.push_bind(like_pattern(filter));
            builder.push(" ESCAPE '\\'");
        }
    }

    fn map_row(row: SqliteRow) -> Result<ListEntry> {
        let tier: i64 = row.get("tier");
        let role = row
            .get::<Option<String>, _>("role")
            .map(|value| {
                SiteRole::parse(&value).ok_or_else(|| anyhow!("unknown site role `{value}`"))
            })
            .transpose()?;
        let site = SiteSummary {
            id: row.get::<SiteId, _>("site_id"),
            domain: row.get("domain"),
            timezone: row.get("timezone"),
        };

        let entry = match tier {
            TIER_INVITATION => ListEntry::Invitation {
                invitation: InvitationSummary {
                    id: row
                        .get::<Option<InvitationId>, _>("invitation_id")
                        .context("invitation row without id")?,
                    role: role.context("invitation row without role")?,
                    inviter_id: row.get::<Option<UserId>, _>("inviter_id"),
                    inviter_email: row.get("inviter_email"),
                    created_at: from_millis(row.get::<Option<i64>, _>("invited_at").unwrap_or(0)),
                },
                site,
            },
            TIER_PINNED => ListEntry::PinnedSite {
                site,
                role,
                pinned_at: from_millis(row.get::<Option<i64>, _>("pinned_at").unwrap_or(0)),
            },
            TIER_SITE => ListEntry::Site { site, role },
            other => return Err(anyhow!("unexpected site list tier {other}")),
        };

        Ok(entry)
    }
}

/// Wraps the filter in `%..%` and escapes LIKE wildcards so the filter is
/// matched as a literal substring.
fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for ch in filter.to_ascii_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl SiteListRepository for SqliteSiteListRepository {
    async fn count_entries(&self, query: &SiteListQuery<'_>) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("");
        Self::push_entries(&mut builder, query);
        builder.push("SELECT COUNT(*) FROM entries e JOIN sites s ON s.id = e.site_id");
        Self::push_domain_filter(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("failed to count site list entries")?;

        Ok(count.max(0) as u64)
    }

    async fn fetch_entries(&self, query: &SiteListQuery<'_>) -> Result<Vec<ListEntry>> {
        let mut builder = QueryBuilder::<Sqlite>::new("");
        Self::push_entries(&mut builder, query);
        builder.push(
            "SELECT e.tier, e.site_id, e.role, e.invitation_id, e.inviter_id, e.invited_at,
                    e.pinned_at, s.domain, s.timezone, u.email AS inviter_email
             FROM entries e
             JOIN sites s ON s.id = e.site_id
             LEFT JOIN users u ON u.id = e.inviter_id",
        );
        Self::push_domain_filter(&mut builder, query);
        builder.push(format!(
            " ORDER BY e.tier, e.tier_key, CASE WHEN e.tier = {TIER_SITE} THEN s.domain END, e.site_id
             LIMIT "
        ));
        builder.push_bind(query.limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to load site list entries")?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
