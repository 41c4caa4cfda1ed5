use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    ids::{SiteId, UserId},
    site::SiteRecord,
};

#[derive(Debug, Clone)]
pub struct CreateSiteParams {
    pub id: SiteId,
    pub domain: String,
    pub timezone: String,
    pub owner_id: UserId,
    pub created_at: i64,
}

#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Inserts the site together with its owner membership.
    async fn create_site(&self, params: CreateSiteParams) -> Result<SiteRecord>;
    async fn fetch_site(&self, site_id: &str) -> Result<Option<SiteRecord>>;
    async fn fetch_site_by_domain(&self, domain: &str) -> Result<Option<SiteRecord>>;
    async fn delete_site(&self, site_id: &str) -> Result<bool>;
    async fn set_stats_start_date(&self, site_id: &str, date: NaiveDate) -> Result<()>;
}

pub type SiteRepositoryRef = Arc<dyn SiteRepository>;
