use axum::{routing::get, Router};

use crate::{api, AppState};

pub(crate) mod paths {
    pub const HEALTHZ: &str = "/healthz";
    pub const SETTINGS: &str = "/api/settings";
    pub const SETTINGS_KEY: &str = "/api/settings/{key}";
    pub const ACTIVITY: &str = "/api/activity";
}

pub(crate) fn build(state: AppState) -> Router<()> {
    Router::new()
        .route(paths::HEALTHZ, get(api::health::healthz))
        .route(
            paths::SETTINGS,
            get(api::settings::settings_get_all).post(api::settings::settings_update),
        )
        .route(paths::SETTINGS_KEY, get(api::settings::settings_get))
        .route(
            paths::ACTIVITY,
            get(api::activity::activity_list).delete(api::activity::activity_clear),
        )
        .with_state(state)
}
