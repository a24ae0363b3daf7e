use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_kernel::{validate_key, ActivityEntry, SettingValue, StoreError};
use folio_policy::Capability;
use serde_json::{json, Value};

use crate::{auth, responses, AppState};

pub(crate) const UPDATE_ACTION: &str = "settings.update";

/// Full settings map. Unreadable rows are left out rather than failing the call.
pub(crate) async fn settings_get_all(State(state): State<AppState>) -> Response {
    match state.settings().get_all_async().await {
        Ok(snapshot) => Json(snapshot.values).into_response(),
        Err(err) => responses::internal(&err),
    }
}

pub(crate) async fn settings_get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Response {
    match state.settings().get_async(&key).await {
        Ok(Some(value)) => Json(json!({"key": key, "value": value})).into_response(),
        Ok(None) => responses::not_found(format!("no setting named '{key}'")),
        Err(StoreError::InvalidKey(_)) => responses::bad_request("invalid setting key"),
        Err(err) => responses::internal(&err),
    }
}

/// Upsert a partial map of settings. Each key is written on its own; one
/// `settings.update` activity entry lists the keys that changed.
pub(crate) async fn settings_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let principal = match auth::authorize(&state, &headers, &Capability::SETTINGS_WRITE) {
        Ok(p) => p,
        Err(denied) => return denied,
    };
    let entries = match parse_update(&body) {
        Ok(entries) => entries,
        Err(detail) => return responses::bad_request(detail),
    };
    if entries.is_empty() {
        return Json(json!({"success": true, "updated": []})).into_response();
    }

    let outcome = match state.settings().set_many_async(entries).await {
        Ok(outcome) => outcome,
        Err(err) => return responses::internal(&err),
    };

    let audit = if outcome.updated.is_empty() {
        None
    } else {
        let entry = ActivityEntry::new(
            principal.actor_id,
            principal.display_name(),
            UPDATE_ACTION,
            outcome.updated.join(", "),
        );
        Some(state.activity().record_async(entry).await)
    };

    if !outcome.failed.is_empty() {
        let failed: serde_json::Map<String, Value> = outcome
            .failed
            .iter()
            .map(|(k, reason)| (k.clone(), Value::String(reason.clone())))
            .collect();
        return responses::problem_with(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            format!("{} setting(s) could not be written", failed.len()),
            json!({"updated": outcome.updated, "failed": failed}),
        );
    }

    Json(json!({
        "success": true,
        "updated": outcome.updated,
        "audit": audit,
    }))
    .into_response()
}

fn parse_update(body: &[u8]) -> Result<Vec<(String, SettingValue)>, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| format!("invalid JSON body: {err}"))?;
    let Value::Object(map) = value else {
        return Err("body must be a JSON object of setting keys to values".into());
    };
    map.into_iter()
        .map(|(key, value)| {
            validate_key(&key).map_err(|err| err.to_string())?;
            Ok((key, SettingValue::from_json(&value)))
        })
        .collect()
}
