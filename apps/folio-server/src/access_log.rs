use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use folio_policy::Role;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::AppState;

#[derive(Clone, Debug)]
struct Cfg {
    enabled: bool,
    sample_n: u64,
}

static CFG: Lazy<Cfg> = Lazy::new(|| Cfg {
    enabled: std::env::var("FOLIO_ACCESS_LOG").ok().as_deref() == Some("1"),
    sample_n: std::env::var("FOLIO_ACCESS_SAMPLE_N")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
        .max(1),
});

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// One `http.access` event per request (method, matched route, status,
/// duration, principal role). Off unless `FOLIO_ACCESS_LOG=1`.
pub(crate) async fn access_log_mw(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !CFG.enabled {
        return next.run(req).await;
    }
    let started = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let role = principal_role(&state, req.headers());
    let res = next.run(req).await;
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    if CFG.sample_n > 1 && n % CFG.sample_n != 0 {
        return res;
    }
    tracing::info!(
        target: "http.access",
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        dur_ms = started.elapsed().as_millis() as u64,
        role = %role
    );
    res
}

/// Role as the configured auth context resolves it, the same one the gate sees.
fn principal_role(state: &AppState, headers: &HeaderMap) -> Role {
    state.auth().authenticate(headers).role
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthContext, ROLE_HEADER};
    use crate::test_support::fixtures;
    use folio_policy::Principal;
    use std::sync::Arc;

    #[tokio::test]
    async fn role_follows_the_auth_context_not_the_raw_header() {
        struct FixedEditor;
        impl AuthContext for FixedEditor {
            fn authenticate(&self, _headers: &HeaderMap) -> Principal {
                Principal::new(Role::editor())
            }
        }
        let (_dir, state) = fixtures::state().await;
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, "Admin".parse().unwrap());

        assert_eq!(principal_role(&state, &headers), Role::admin());
        let state = state.with_auth(Arc::new(FixedEditor));
        assert_eq!(principal_role(&state, &headers), Role::editor());
    }

    #[tokio::test]
    async fn missing_claim_logs_as_anonymous() {
        let (_dir, state) = fixtures::state().await;
        assert!(principal_role(&state, &HeaderMap::new()).is_anonymous());
    }
}
