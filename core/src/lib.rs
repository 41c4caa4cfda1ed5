pub mod config;
pub mod db;
pub mod ids;
pub mod invitation;
pub mod membership;
pub mod pagination;
pub mod site;
pub mod site_list;
pub mod site_preference;
pub mod time;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;
