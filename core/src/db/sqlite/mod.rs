pub mod connection;
pub mod event_repo;
pub mod invitation_repo;
pub mod membership_repo;
pub mod site_list_repo;
pub mod site_preference_repo;
pub mod site_repo;
