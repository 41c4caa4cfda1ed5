use std::sync::Arc;

use statwell_core::{
    config::AppConfig,
    db::Database,
    invitation::InvitationStore,
    membership::MembershipStore,
    site::SiteStore,
    site_list::SiteListStore,
    site_preference::SitePreferenceStore,
    user::UserStore,
};

use crate::{site::service::SiteService, user::service::UserService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_store: UserStore,
    pub site_store: SiteStore,
    pub membership_store: MembershipStore,
    pub user_service: Arc<UserService>,
    pub site_service: Arc<SiteService>,
}

pub fn build_state(database: &Database, app_config: &AppConfig) -> AppState {
    let config = Arc::new(app_config.clone());
    let user_store = UserStore::new(database);
    let site_store = SiteStore::new(database);
    let membership_store = MembershipStore::new(database);

    let user_service = Arc::new(UserService::new(user_store.clone(), config.clone()));
    let site_service = Arc::new(SiteService::new(
        site_store.clone(),
        membership_store.clone(),
        InvitationStore::new(database),
        SitePreferenceStore::new(database, app_config.pin_limit),
        SiteListStore::new(database, app_config.page_limits()),
    ));

    AppState {
        config,
        user_store,
        site_store,
        membership_store,
        user_service,
        site_service,
    }
}
