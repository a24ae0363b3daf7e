pub(crate) mod activity;
pub(crate) mod health;
pub(crate) mod settings;
