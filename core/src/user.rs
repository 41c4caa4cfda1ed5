use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    config::AppConfig,
    db::Database,
    ids::UserId,
    time::{from_millis, now_millis},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The identity a site listing or preference change is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub email: String,
    pub super_admin: bool,
}

impl Viewer {
    pub fn for_user(user: &UserRecord, config: &AppConfig) -> Self {
        Self {
            user_id: user.id.clone(),
            email: normalize_email(&user.email),
            super_admin: config.is_super_admin(user.id.as_str()),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct UserStore {
    pool: Pool<Sqlite>,
}

impl UserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    pub async fn create(&self, email: &str, name: Option<&str>) -> Result<UserRecord> {
        let id = UserId::generate();
        let email = normalize_email(email);
        let created_at = now_millis();

        sqlx::query("INSERT INTO users (id, email, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&email)
            .bind(name)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert user {email}"))?;

        Ok(UserRecord {
            id,
            email,
            name: name.map(str::to_owned),
            created_at: from_millis(created_at),
        })
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_row))
    }

    fn map_row(row: SqliteRow) -> UserRecord {
        UserRecord {
            id: row.get::<UserId, _>("id"),
            email: row.get("email"),
            name: row.get("name"),
            created_at: from_millis(row.get("created_at")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_database;

    #[tokio::test]
    async fn create_normalizes_email_for_lookup() {
        let (_dir, database) = setup_database().await;
        let users = UserStore::new(&database);

        let created = users
            .create("  Alice@Example.COM ", Some("Alice"))
            .await
            .expect("create user");
        assert_eq!(created.email, "alice@example.com");

        let found = users
            .find_by_email("ALICE@example.com")
            .await
            .expect("lookup")
            .expect("user exists");
        assert_eq!(found.id, created.id);
        assert_eq!(found.name.as_deref(), Some("Alice"));

        let by_id = users.find_by_id(&created.id).await.expect("lookup by id");
        assert_eq!(by_id, Some(found));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let (_dir, database) = setup_database().await;
        let users = UserStore::new(&database);

        users.create("bob@example.com", None).await.expect("first");
        let err = users
            .create("BOB@example.com", None)
            .await
            .expect_err("duplicate email");
        assert!(crate::db::errors::is_unique_violation(&err));
    }

    #[test]
    fn viewer_flags_configured_super_admins() {
        let user = UserRecord {
            id: UserId::from("root"),
            email: "Root@Example.com".into(),
            name: None,
            created_at: Utc::now(),
        };
        let config = AppConfig {
            super_admin_ids: vec!["root".into()],
            ..AppConfig::default()
        };

        let viewer = Viewer::for_user(&user, &config);
        assert!(viewer.super_admin);
        assert_eq!(viewer.email, "root@example.com");
        assert!(!Viewer::for_user(&user, &AppConfig::default()).super_admin);
    }
}
