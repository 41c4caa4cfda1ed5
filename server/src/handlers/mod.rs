// HTTP handlers module structure

pub(crate) mod health_handlers;
pub(crate) mod invitation_handlers;
pub(crate) mod site_handlers;
