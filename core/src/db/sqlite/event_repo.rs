use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

use crate::db::event_repo::EventRepository;

pub struct SqliteEventRepository {
    pool: Pool<Sqlite>,
}

impl SqliteEventRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn record_event(&self, site_id: &str, timestamp: i64) -> Result<()> {
        sqlx::query("INSERT INTO events (site_id, timestamp) VALUES (?, ?)")
            .bind(site_id)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn earliest_event_at(&self, site_id: &str) -> Result<Option<i64>> {
        let earliest: Option<i64> =
            sqlx::query_scalar("SELECT MIN(timestamp) FROM events WHERE site_id = ?")
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(earliest)
    }
}
