use tempfile::TempDir;

use crate::{
    config::AppConfig,
    db::Database,
    site::{SiteRecord, SiteStore},
    user::{UserRecord, UserStore, Viewer, normalize_email},
};

pub async fn setup_database() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = AppConfig {
        database_path: temp_dir
            .path()
            .join("statwell.db")
            .to_string_lossy()
            .into_owned(),
        ..AppConfig::default()
    };

    let database = Database::connect(&config).await.expect("connect database");
    (temp_dir, database)
}

pub async fn seed_user(database: &Database, email: &str) -> UserRecord {
    UserStore::new(database)
        .create(email, None)
        .await
        .expect("seed user")
}

pub async fn seed_site(database: &Database, domain: &str, owner: &UserRecord) -> SiteRecord {
    SiteStore::new(database)
        .create(domain, None, &owner.id)
        .await
        .expect("seed site")
}

pub fn viewer_for(user: &UserRecord) -> Viewer {
    Viewer {
        user_id: user.id.clone(),
        email: normalize_email(&user.email),
        super_admin: false,
    }
}
