use std::{fs, fs::File, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use self::{
    event_repo::EventRepositoryRef,
    invitation_repo::InvitationRepositoryRef,
    membership_repo::MembershipRepositoryRef,
    site_list_repo::SiteListRepositoryRef,
    site_preference_repo::SitePreferenceRepositoryRef,
    site_repo::SiteRepositoryRef,
    sqlite::{
        connection::{self as sqlite_connection, SqlitePool},
        event_repo::SqliteEventRepository,
        invitation_repo::SqliteInvitationRepository,
        membership_repo::SqliteMembershipRepository,
        site_list_repo::SqliteSiteListRepository,
        site_preference_repo::SqliteSitePreferenceRepository,
        site_repo::SqliteSiteRepository,
    },
};
use crate::config::AppConfig;

pub mod errors;
pub mod event_repo;
pub mod invitation_repo;
pub mod membership_repo;
pub mod site_list_repo;
pub mod site_preference_repo;
pub mod site_repo;
pub mod sqlite;

#[derive(Clone)]
pub struct RepositoryRegistry {
    site_repo: SiteRepositoryRef,
    event_repo: EventRepositoryRef,
    membership_repo: MembershipRepositoryRef,
    invitation_repo: InvitationRepositoryRef,
    site_preference_repo: SitePreferenceRepositoryRef,
    site_list_repo: SiteListRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        site_repo: SiteRepositoryRef,
        event_repo: EventRepositoryRef,
        membership_repo: MembershipRepositoryRef,
        invitation_repo: InvitationRepositoryRef,
        site_preference_repo: SitePreferenceRepositoryRef,
        site_list_repo: SiteListRepositoryRef,
    ) -> Self {
        Self {
            site_repo,
            event_repo,
            membership_repo,
            invitation_repo,
            site_preference_repo,
            site_list_repo,
        }
    }

    pub fn site_repo(&self) -> SiteRepositoryRef {
        self.site_repo.clone()
    }

    pub fn event_repo(&self) -> EventRepositoryRef {
        self.event_repo.clone()
    }

    pub fn membership_repo(&self) -> MembershipRepositoryRef {
        self.membership_repo.clone()
    }

    pub fn invitation_repo(&self) -> InvitationRepositoryRef {
        self.invitation_repo.clone()
    }

    pub fn site_preference_repo(&self) -> SitePreferenceRepositoryRef {
        self.site_preference_repo.clone()
    }

    pub fn site_list_repo(&self) -> SiteListRepositoryRef {
        self.site_list_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let db_file = Self::resolve_db_path(&config.database_path)?;
        let data_dir = match db_file.parent() {
            Some(parent) => parent.to_path_buf(),
            None => std::env::current_dir().context("failed to obtain current directory")?,
        };

        fs::create_dir_all(&data_dir).with_context(|| {
            format!(
                "failed to create database directory: {}",
                data_dir.display()
            )
        })?;

        if !db_file.exists() {
            File::create(&db_file).with_context(|| {
                format!("failed to create database file: {}", db_file.display())
            })?;
        }

        let pool =
            sqlite_connection::create_pool(&db_file, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        let repositories = Arc::new(RepositoryRegistry::new(
            Arc::new(SqliteSiteRepository::new(pool.clone())) as SiteRepositoryRef,
            Arc::new(SqliteEventRepository::new(pool.clone())) as EventRepositoryRef,
            Arc::new(SqliteMembershipRepository::new(pool.clone())) as MembershipRepositoryRef,
            Arc::new(SqliteInvitationRepository::new(pool.clone())) as InvitationRepositoryRef,
            Arc::new(SqliteSitePreferenceRepository::new(pool.clone()))
                as SitePreferenceRepositoryRef,
            Arc::new(SqliteSiteListRepository::new(pool.clone())) as SiteListRepositoryRef,
        ));

        Ok(Self {
            pool,
            path: db_file,
            repositories,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    fn resolve_db_path(path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            Ok(cwd.join(path))
        }
    }
}
