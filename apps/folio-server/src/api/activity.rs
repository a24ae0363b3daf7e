use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_kernel::activity::DEFAULT_RECENT;
use folio_policy::Capability;
use serde::Deserialize;
use serde_json::json;

use crate::{auth, responses, AppState};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecentQuery {
    pub limit: Option<i64>,
}

/// Newest entries first.
pub(crate) async fn activity_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<RecentQuery>,
) -> Response {
    if let Err(denied) = auth::authorize(&state, &headers, &Capability::ACTIVITY_READ) {
        return denied;
    }
    match state
        .activity()
        .recent_async(q.limit.unwrap_or(DEFAULT_RECENT))
        .await
    {
        Ok(items) => Json(items).into_response(),
        Err(err) => responses::internal(&err),
    }
}

pub(crate) async fn activity_clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match auth::authorize(&state, &headers, &Capability::ACTIVITY_CLEAR) {
        Ok(p) => p,
        Err(denied) => return denied,
    };
    match state.activity().clear_async().await {
        Ok(deleted) => {
            tracing::info!(
                target: "folio::activity",
                actor = %principal.display_name(),
                deleted,
                "activity log cleared"
            );
            Json(json!({"success": true, "deleted": deleted})).into_response()
        }
        Err(err) => responses::internal(&err),
    }
}
