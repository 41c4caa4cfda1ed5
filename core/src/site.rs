use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::{
    db::{
        Database,
        event_repo::EventRepositoryRef,
        site_repo::{CreateSiteParams, SiteRepositoryRef},
    },
    ids::{SiteId, UserId},
    time::{from_millis, now_millis, to_millis},
};

pub const DEFAULT_TIMEZONE: &str = "Etc/UTC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    pub id: SiteId,
    pub domain: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub stats_start_date: Option<NaiveDate>,
}

/// Lower-cases the domain and strips surrounding whitespace and a trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Clone)]
pub struct SiteStore {
    site_repo: SiteRepositoryRef,
    event_repo: EventRepositoryRef,
}

impl SiteStore {
    pub fn new(database: &Database) -> Self {
        let repositories = database.repositories();
        Self {
            site_repo: repositories.site_repo(),
            event_repo: repositories.event_repo(),
        }
    }

    /// Creates the site and makes `owner_id` its owner.
    pub async fn create(
        &self,
        domain: &str,
        timezone: Option<&str>,
        owner_id: &str,
    ) -> Result<SiteRecord> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            bail!("site domain must not be empty");
        }

        let timezone = timezone
            .map(str::trim)
            .filter(|tz| !tz.is_empty())
            .unwrap_or(DEFAULT_TIMEZONE)
            .to_owned();

        self.site_repo
            .create_site(CreateSiteParams {
                id: SiteId::generate(),
                domain,
                timezone,
                owner_id: UserId::from(owner_id),
                created_at: now_millis(),
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<SiteRecord>> {
        self.site_repo.fetch_site(id).await
    }

    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>> {
        self.site_repo
            .fetch_site_by_domain(&normalize_domain(domain))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.site_repo.delete_site(id).await
    }

    pub async fn record_event(&self, site_id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        self.event_repo
            .record_event(site_id, to_millis(timestamp))
            .await
    }

    /// Date of the first recorded event for the site.
    ///
    /// The value is computed from the event table on first use and written
    /// back onto the site row; later calls return the stored date. Sites
    /// without events yield `None` and nothing is persisted.
    pub async fn stats_start_date(&self, site: &SiteRecord) -> Result<Option<NaiveDate>> {
        if let Some(date) = site.stats_start_date {
            return Ok(Some(date));
        }

        let Some(earliest) = self.event_repo.earliest_event_at(&site.id).await? else {
            return Ok(None);
        };

        let date = from_millis(earliest).date_naive();
        self.site_repo
            .set_stats_start_date(&site.id, date)
            .await?;
        debug!(site_id = %site.id, %date, "memoized stats start date");

        Ok(Some(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::errors::is_unique_violation,
        membership::{MembershipStore, SiteRole},
        test_support::{seed_user, setup_database},
    };
    use chrono::TimeZone;

    #[test]
    fn domains_are_normalized() {
        assert_eq!(normalize_domain("  Example.COM. "), "example.com");
    }

    #[tokio::test]
    async fn create_assigns_owner_membership() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let sites = SiteStore::new(&database);

        let site = sites
            .create("Example.com", None, &owner.id)
            .await
            .expect("create site");
        assert_eq!(site.domain, "example.com");
        assert_eq!(site.timezone, DEFAULT_TIMEZONE);
        assert_eq!(site.stats_start_date, None);

        let role = MembershipStore::new(&database)
            .find_role(&site.id, &owner.id)
            .await
            .unwrap();
        assert_eq!(role, Some(SiteRole::Owner));

        let by_domain = sites.find_by_domain("EXAMPLE.com").await.unwrap();
        assert_eq!(by_domain, Some(site));
    }

    #[tokio::test]
    async fn duplicate_domain_is_rejected() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let sites = SiteStore::new(&database);

        sites.create("dup.example.com", None, &owner.id).await.unwrap();
        let err = sites
            .create("DUP.example.com", Some("Europe/Berlin"), &owner.id)
            .await
            .expect_err("duplicate domain");
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn empty_domain_is_rejected() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;

        let err = SiteStore::new(&database)
            .create("   ", None, &owner.id)
            .await
            .expect_err("empty domain");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn stats_start_date_is_computed_once_and_persisted() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let sites = SiteStore::new(&database);
        let site = sites.create("stats.example.com", None, &owner.id).await.unwrap();

        assert_eq!(sites.stats_start_date(&site).await.unwrap(), None);
        let reloaded = sites.find_by_id(&site.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stats_start_date, None);

        let first = Utc.with_ymd_and_hms(2024, 5, 2, 23, 59, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        sites.record_event(&site.id, later).await.unwrap();
        sites.record_event(&site.id, first).await.unwrap();

        let expected = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(sites.stats_start_date(&site).await.unwrap(), Some(expected));

        let reloaded = sites.find_by_id(&site.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stats_start_date, Some(expected));

        // The stored date wins over events recorded afterwards.
        let earlier = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        sites.record_event(&site.id, earlier).await.unwrap();
        assert_eq!(sites.stats_start_date(&reloaded).await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn delete_removes_site() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let sites = SiteStore::new(&database);
        let site = sites.create("gone.example.com", None, &owner.id).await.unwrap();

        assert!(sites.delete(&site.id).await.unwrap());
        assert!(!sites.delete(&site.id).await.unwrap());
        assert_eq!(sites.find_by_id(&site.id).await.unwrap(), None);
    }
}
