use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{ids::UserId, site_preference::SitePreference};

#[async_trait]
pub trait SitePreferenceRepository: Send + Sync {
    async fn fetch_preference(
        &self,
        user_id: &UserId,
        site_id: &str,
    ) -> Result<Option<SitePreference>>;

    /// Whether the site exists and the user is a member of it (or
    /// `super_admin` is set).
    async fn has_site_access(
        &self,
        user_id: &UserId,
        site_id: &str,
        super_admin: bool,
    ) -> Result<bool>;

    /// Pinned preferences on sites the user can still access.
    async fn count_pinned(&self, user_id: &UserId, super_admin: bool) -> Result<u64>;

    async fn upsert_pinned_at(
        &self,
        user_id: &UserId,
        site_id: &str,
        pinned_at: Option<i64>,
        updated_at: i64,
    ) -> Result<SitePreference>;

    /// Pins the site only while fewer than `limit` other accessible sites
    /// are pinned. The check and the write happen in one statement;
    /// returns `false` when the limit prevented the write.
    async fn pin_within_limit(
        &self,
        user_id: &UserId,
        site_id: &str,
        pinned_at: i64,
        limit: u32,
        super_admin: bool,
    ) -> Result<bool>;
}

pub type SitePreferenceRepositoryRef = Arc<dyn SitePreferenceRepository>;
