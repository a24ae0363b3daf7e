//! Who is calling. The default [`HeaderAuth`] trusts the role the client
//! asserts in `X-Role`; swap in another [`AuthContext`] on `AppState` to
//! verify callers without touching the handlers.

use axum::http::HeaderMap;
use axum::response::Response;
use folio_policy::{Capability, Decision, Principal, Role};
use tracing::info;

use crate::{responses, AppState};

pub(crate) const ROLE_HEADER: &str = "x-role";
pub(crate) const USER_HEADER: &str = "x-user";
pub(crate) const USER_ID_HEADER: &str = "x-user-id";

pub(crate) trait AuthContext: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Principal;
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct HeaderAuth;

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl AuthContext for HeaderAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Principal {
        let role = Role::from_claim(header_str(headers, ROLE_HEADER));
        let actor_id = header_str(headers, USER_ID_HEADER).and_then(|v| v.parse().ok());
        let actor_name = header_str(headers, USER_HEADER).map(str::to_string);
        Principal::new(role).with_actor(actor_id, actor_name)
    }
}

/// Authenticate the caller and check `capability`. A denial comes back as a
/// ready 403 response; nothing has been touched at that point.
pub(crate) fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    capability: &Capability,
) -> Result<Principal, Response> {
    let principal = state.auth().authenticate(headers);
    match state.gate().check(&principal, capability) {
        Decision::Allow => Ok(principal),
        denied => {
            info!(
                target: "folio::access",
                role = %principal.role,
                capability = %capability,
                "request denied"
            );
            Err(responses::forbidden(&denied))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_role_user_and_id() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static(" Editor "));
        headers.insert(USER_HEADER, HeaderValue::from_static("dana"));
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("7"));
        let p = HeaderAuth.authenticate(&headers);
        assert_eq!(p.role, Role::editor());
        assert_eq!(p.actor_id, Some(7));
        assert_eq!(p.display_name(), "dana");
    }

    #[test]
    fn missing_headers_are_anonymous() {
        let p = HeaderAuth.authenticate(&HeaderMap::new());
        assert!(p.role.is_anonymous());
        assert_eq!(p.actor_id, None);
        assert_eq!(p.actor_name, None);
    }

    #[test]
    fn non_numeric_user_id_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(HeaderAuth.authenticate(&headers).actor_id, None);
    }
}
