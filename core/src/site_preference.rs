use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    db::{Database, site_preference_repo::SitePreferenceRepositoryRef},
    ids::{SiteId, UserId},
    time::{now_millis, to_millis},
    user::Viewer,
};

/// Per (user, site) display preferences. A missing row means "unpinned".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePreference {
    pub user_id: UserId,
    pub site_id: SiteId,
    pub pinned_at: Option<DateTime<Utc>>,
}

impl SitePreference {
    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }
}

/// The preference fields callers are allowed to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceOption {
    PinnedAt,
}

impl PreferenceOption {
    pub const ALL: &'static [PreferenceOption] = &[PreferenceOption::PinnedAt];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceOption::PinnedAt => "pinned_at",
        }
    }
}

impl fmt::Display for PreferenceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferenceOption {
    type Err = PreferenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|option| option.as_str() == value)
            .ok_or_else(|| PreferenceError::UnknownOption(value.to_owned()))
    }
}

/// Typed value for a [`PreferenceOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceValue {
    PinnedAt(Option<DateTime<Utc>>),
}

impl PreferenceValue {
    pub fn option(&self) -> PreferenceOption {
        match self {
            PreferenceValue::PinnedAt(_) => PreferenceOption::PinnedAt,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PreferenceError {
    #[error("too many pinned sites (limit {limit})")]
    TooManyPins { limit: u32 },
    #[error("site {site_id} is not accessible to user {user_id}")]
    NotFound { site_id: String, user_id: String },
    #[error("unknown preference option `{0}`")]
    UnknownOption(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SitePreferenceStore {
    preference_repo: SitePreferenceRepositoryRef,
    pin_limit: u32,
}

impl SitePreferenceStore {
    pub fn new(database: &Database, pin_limit: u32) -> Self {
        Self {
            preference_repo: database.repositories().site_preference_repo(),
            pin_limit,
        }
    }

    pub fn pin_limit(&self) -> u32 {
        self.pin_limit
    }

    pub async fn get(
        &self,
        viewer: &Viewer,
        site_id: &str,
    ) -> Result<SitePreference, PreferenceError> {
        self.ensure_access(viewer, site_id).await?;
        Ok(self.load_or_default(&viewer.user_id, site_id).await?)
    }

    pub async fn pinned_count(&self, viewer: &Viewer) -> Result<u64, PreferenceError> {
        Ok(self
            .preference_repo
            .count_pinned(&viewer.user_id, viewer.super_admin)
            .await?)
    }

    /// Pins an unpinned site or unpins a pinned one.
    ///
    /// Pinning is refused once the viewer already has `pin_limit` pinned
    /// sites; the count and the write run as a single statement so
    /// concurrent requests cannot overshoot the limit. Unpinning is never
    /// limited.
    pub async fn toggle_pin(
        &self,
        viewer: &Viewer,
        site_id: &str,
    ) -> Result<SitePreference, PreferenceError> {
        self.ensure_access(viewer, site_id).await?;

        let current = self.load_or_default(&viewer.user_id, site_id).await?;
        if current.is_pinned() {
            let preference = self
                .preference_repo
                .upsert_pinned_at(&viewer.user_id, site_id, None, now_millis())
                .await?;
            info!(user_id = %viewer.user_id, site_id, "site unpinned");
            return Ok(preference);
        }

        let preference = self.pin(viewer, site_id, now_millis()).await?;
        info!(user_id = %viewer.user_id, site_id, "site pinned");
        Ok(preference)
    }

    /// Writes a single preference field, creating the row if needed.
    ///
    /// Setting `pinned_at` on an unpinned site counts against the pin limit
    /// exactly like [`SitePreferenceStore::toggle_pin`].
    pub async fn set_option(
        &self,
        viewer: &Viewer,
        site_id: &str,
        value: PreferenceValue,
    ) -> Result<SitePreference, PreferenceError> {
        self.ensure_access(viewer, site_id).await?;

        let preference = match value {
            PreferenceValue::PinnedAt(Some(pinned_at)) => {
                let current = self.load_or_default(&viewer.user_id, site_id).await?;
                if current.is_pinned() {
                    self.preference_repo
                        .upsert_pinned_at(
                            &viewer.user_id,
                            site_id,
                            Some(to_millis(pinned_at)),
                            now_millis(),
                        )
                        .await?
                } else {
                    self.pin(viewer, site_id, to_millis(pinned_at)).await?
                }
            }
            PreferenceValue::PinnedAt(None) => {
                self.preference_repo
                    .upsert_pinned_at(&viewer.user_id, site_id, None, now_millis())
                    .await?
            }
        };

        Ok(preference)
    }

    /// Pins an unpinned site unless the viewer is already at the limit.
    async fn pin(
        &self,
        viewer: &Viewer,
        site_id: &str,
        pinned_at: i64,
    ) -> Result<SitePreference, PreferenceError> {
        let pinned = self
            .preference_repo
            .pin_within_limit(
                &viewer.user_id,
                site_id,
                pinned_at,
                self.pin_limit,
                viewer.super_admin,
            )
            .await?;

        if !pinned {
            info!(
                user_id = %viewer.user_id,
                site_id,
                limit = self.pin_limit,
                "pin rejected, limit reached"
            );
            return Err(PreferenceError::TooManyPins {
                limit: self.pin_limit,
            });
        }

        Ok(self.load_or_default(&viewer.user_id, site_id).await?)
    }

    async fn ensure_access(&self, viewer: &Viewer, site_id: &str) -> Result<(), PreferenceError> {
        let accessible = self
            .preference_repo
            .has_site_access(&viewer.user_id, site_id, viewer.super_admin)
            .await?;

        if accessible {
            Ok(())
        } else {
            Err(PreferenceError::NotFound {
                site_id: site_id.to_owned(),
                user_id: viewer.user_id.to_string(),
            })
        }
    }

    async fn load_or_default(
        &self,
        user_id: &UserId,
        site_id: &str,
    ) -> anyhow::Result<SitePreference> {
        let preference = self
            .preference_repo
            .fetch_preference(user_id, site_id)
            .await?
            .unwrap_or_else(|| SitePreference {
                user_id: user_id.clone(),
                site_id: SiteId::from(site_id),
                pinned_at: None,
            });
        Ok(preference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        membership::{MembershipStore, SiteRole},
        test_support::{seed_site, seed_user, setup_database, viewer_for},
    };
    use chrono::TimeZone;

    #[test]
    fn option_names_parse_exhaustively() {
        assert_eq!(
            "pinned_at".parse::<PreferenceOption>().unwrap(),
            PreferenceOption::PinnedAt
        );
        let err = "favourite".parse::<PreferenceOption>().unwrap_err();
        assert!(matches!(err, PreferenceError::UnknownOption(name) if name == "favourite"));
        assert_eq!(
            PreferenceValue::PinnedAt(None).option(),
            PreferenceOption::PinnedAt
        );
    }

    #[tokio::test]
    async fn toggle_twice_restores_unpinned_state() {
        let (_dir, database) = setup_database().await;
        let user = seed_user(&database, "user@example.com").await;
        let site = seed_site(&database, "example.com", &user).await;
        let viewer = viewer_for(&user);
        let preferences = SitePreferenceStore::new(&database, 9);

        let before = preferences.get(&viewer, &site.id).await.unwrap();
        assert!(!before.is_pinned());

        let pinned = preferences.toggle_pin(&viewer, &site.id).await.unwrap();
        assert!(pinned.is_pinned());
        assert_eq!(preferences.pinned_count(&viewer).await.unwrap(), 1);

        let unpinned = preferences.toggle_pin(&viewer, &site.id).await.unwrap();
        assert!(!unpinned.is_pinned());
        assert_eq!(unpinned, before);
        assert_eq!(preferences.pinned_count(&viewer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tenth_pin_is_rejected_until_one_is_released() {
        let (_dir, database) = setup_database().await;
        let user = seed_user(&database, "user@example.com").await;
        let viewer = viewer_for(&user);
        let preferences = SitePreferenceStore::new(&database, 9);

        let mut sites = Vec::new();
        for index in 0..10 {
            sites.push(seed_site(&database, &format!("site{index}.example.com"), &user).await);
        }

        for site in &sites[..9] {
            preferences.toggle_pin(&viewer, &site.id).await.expect("pin");
        }

        let err = preferences
            .toggle_pin(&viewer, &sites[9].id)
            .await
            .expect_err("limit reached");
        assert!(matches!(err, PreferenceError::TooManyPins { limit: 9 }));
        assert!(!preferences.get(&viewer, &sites[9].id).await.unwrap().is_pinned());

        preferences.toggle_pin(&viewer, &sites[0].id).await.expect("unpin");
        let pinned = preferences
            .toggle_pin(&viewer, &sites[9].id)
            .await
            .expect("pin after release");
        assert!(pinned.is_pinned());
        assert_eq!(preferences.pinned_count(&viewer).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn setting_pinned_at_respects_pin_limit() {
        let (_dir, database) = setup_database().await;
        let user = seed_user(&database, "user@example.com").await;
        let viewer = viewer_for(&user);
        let preferences = SitePreferenceStore::new(&database, 2);

        let mut sites = Vec::new();
        for index in 0..3 {
            sites.push(seed_site(&database, &format!("site{index}.example.com"), &user).await);
        }

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        for site in &sites[..2] {
            preferences
                .set_option(&viewer, &site.id, PreferenceValue::PinnedAt(Some(at)))
                .await
                .expect("pin within limit");
        }

        let err = preferences
            .set_option(&viewer, &sites[2].id, PreferenceValue::PinnedAt(Some(at)))
            .await
            .unwrap_err();
        assert!(matches!(err, PreferenceError::TooManyPins { limit: 2 }));
        assert_eq!(preferences.pinned_count(&viewer).await.unwrap(), 2);

        let later = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let repinned = preferences
            .set_option(&viewer, &sites[0].id, PreferenceValue::PinnedAt(Some(later)))
            .await
            .expect("re-timestamping an existing pin is not limited");
        assert_eq!(repinned.pinned_at, Some(later));

        preferences
            .set_option(&viewer, &sites[1].id, PreferenceValue::PinnedAt(None))
            .await
            .unwrap();
        let pinned = preferences
            .set_option(&viewer, &sites[2].id, PreferenceValue::PinnedAt(Some(at)))
            .await
            .expect("pin after release");
        assert_eq!(pinned.pinned_at, Some(at));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pins_never_exceed_limit() {
        let (_dir, database) = setup_database().await;
        let user = seed_user(&database, "user@example.com").await;
        let viewer = viewer_for(&user);
        let preferences = SitePreferenceStore::new(&database, 9);

        let mut sites = Vec::new();
        for index in 0..30 {
            sites.push(seed_site(&database, &format!("site{index}.example.com"), &user).await);
        }

        let tasks: Vec<_> = sites
            .iter()
            .map(|site| {
                let preferences = preferences.clone();
                let viewer = viewer.clone();
                let site_id = site.id.clone();
                tokio::spawn(async move { preferences.toggle_pin(&viewer, &site_id).await })
            })
            .collect();

        let (mut pinned, mut rejected) = (0, 0);
        for task in tasks {
            match task.await.expect("task panicked") {
                Ok(preference) => {
                    assert!(preference.is_pinned());
                    pinned += 1;
                }
                Err(PreferenceError::TooManyPins { limit: 9 }) => rejected += 1,
                Err(other) => panic!("unexpected pin error: {other:?}"),
            }
        }

        assert_eq!(pinned, 9);
        assert_eq!(rejected, 21);
        assert_eq!(preferences.pinned_count(&viewer).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn pins_on_revoked_sites_do_not_count_toward_limit() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let user = seed_user(&database, "user@example.com").await;
        let viewer = viewer_for(&user);
        let memberships = MembershipStore::new(&database);
        let preferences = SitePreferenceStore::new(&database, 1);

        let shared = seed_site(&database, "shared.example.com", &owner).await;
        let own = seed_site(&database, "own.example.com", &user).await;
        memberships
            .add_member(&shared.id, &user.id, SiteRole::Viewer)
            .await
            .unwrap();

        preferences.toggle_pin(&viewer, &shared.id).await.unwrap();
        assert!(preferences.toggle_pin(&viewer, &own.id).await.is_err());

        memberships.remove_member(&shared.id, &user.id).await.unwrap();
        preferences
            .toggle_pin(&viewer, &own.id)
            .await
            .expect("revoked pin no longer counts");
    }

    #[tokio::test]
    async fn preference_operations_require_access() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let stranger = seed_user(&database, "stranger@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let preferences = SitePreferenceStore::new(&database, 9);
        let viewer = viewer_for(&stranger);

        let err = preferences.toggle_pin(&viewer, &site.id).await.unwrap_err();
        assert!(matches!(err, PreferenceError::NotFound { .. }));

        let err = preferences
            .set_option(&viewer, &site.id, PreferenceValue::PinnedAt(Some(Utc::now())))
            .await
            .unwrap_err();
        assert!(matches!(err, PreferenceError::NotFound { .. }));

        let err = preferences
            .toggle_pin(&viewer_for(&owner), "missing-site")
            .await
            .unwrap_err();
        assert!(matches!(err, PreferenceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn super_admin_can_pin_sites_without_membership() {
        let (_dir, database) = setup_database().await;
        let owner = seed_user(&database, "owner@example.com").await;
        let admin = seed_user(&database, "admin@example.com").await;
        let site = seed_site(&database, "example.com", &owner).await;
        let preferences = SitePreferenceStore::new(&database, 9);

        let mut viewer = viewer_for(&admin);
        viewer.super_admin = true;

        let pinned = preferences.toggle_pin(&viewer, &site.id).await.unwrap();
        assert!(pinned.is_pinned());
    }

    #[tokio::test]
    async fn set_option_overwrites_previous_value() {
        let (_dir, database) = setup_database().await;
        let user = seed_user(&database, "user@example.com").await;
        let site = seed_site(&database, "example.com", &user).await;
        let viewer = viewer_for(&user);
        let preferences = SitePreferenceStore::new(&database, 9);

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();

        let stored = preferences
            .set_option(&viewer, &site.id, PreferenceValue::PinnedAt(Some(first)))
            .await
            .unwrap();
        assert_eq!(stored.pinned_at, Some(first));

        let stored = preferences
            .set_option(&viewer, &site.id, PreferenceValue::PinnedAt(Some(second)))
            .await
            .unwrap();
        assert_eq!(stored.pinned_at, Some(second));

        let cleared = preferences
            .set_option(&viewer, &site.id, PreferenceValue::PinnedAt(None))
            .await
            .unwrap();
        assert_eq!(cleared.pinned_at, None);
        assert_eq!(preferences.get(&viewer, &site.id).await.unwrap(), cleared);
    }
}
