use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::{responses, AppState};

/// Liveness plus a settings read, so a broken database shows up as 503.
pub(crate) async fn healthz(State(state): State<AppState>) -> Response {
    match state.settings().get_all_async().await {
        Ok(snapshot) => Json(json!({
            "ok": true,
            "settings": snapshot.values.len(),
            "skipped": snapshot.skipped.len(),
        }))
        .into_response(),
        Err(err) => responses::unavailable(format!("settings unreadable: {err}")),
    }
}
