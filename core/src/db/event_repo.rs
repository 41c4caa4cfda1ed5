use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn record_event(&self, site_id: &str, timestamp: i64) -> Result<()>;
    /// Smallest event timestamp for the site, in Unix milliseconds.
    async fn earliest_event_at(&self, site_id: &str) -> Result<Option<i64>>;
}

pub type EventRepositoryRef = Arc<dyn EventRepository>;
