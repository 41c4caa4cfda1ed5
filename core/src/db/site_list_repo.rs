use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{site_list::ListEntry, user::Viewer};

/// Shape of one site directory query. `limit`/`offset` are ignored when
/// counting.
#[derive(Debug, Clone, Copy)]
pub struct SiteListQuery<'a> {
    pub viewer: &'a Viewer,
    pub include_invitations: bool,
    pub domain_filter: Option<&'a str>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait SiteListRepository: Send + Sync {
    async fn count_entries(&self, query: &SiteListQuery<'_>) -> Result<u64>;
    async fn fetch_entries(&self, query: &SiteListQuery<'_>) -> Result<Vec<ListEntry>>;
}

pub type SiteListRepositoryRef = Arc<dyn SiteListRepository>;
