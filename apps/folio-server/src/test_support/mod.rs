use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serialises tests that touch the process environment and restores every
/// variable they changed on drop.
pub(crate) mod env {
    use super::*;

    pub(crate) struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: HashMap<String, Option<String>>,
    }

    pub(crate) fn guard() -> EnvGuard {
        EnvGuard {
            _lock: ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            saved: HashMap::new(),
        }
    }

    impl EnvGuard {
        fn remember(&mut self, key: &str) {
            self.saved
                .entry(key.to_string())
                .or_insert_with(|| std::env::var(key).ok());
        }

        pub(crate) fn set(&mut self, key: &str, value: impl AsRef<str>) {
            self.remember(key);
            std::env::set_var(key, value.as_ref());
        }

        pub(crate) fn remove(&mut self, key: &str) {
            self.remember(key);
            std::env::remove_var(key);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain() {
                match value {
                    Some(val) => std::env::set_var(&key, val),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

/// Storage-backed state and request helpers for router tests.
pub(crate) mod fixtures {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use folio_kernel::Kernel;
    use folio_policy::AccessGate;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    use crate::auth::ROLE_HEADER;
    use crate::AppState;

    fn kernel() -> (TempDir, Kernel) {
        let dir = tempfile::tempdir().expect("tempdir");
        let kernel = Kernel::open_file(&dir.path().join("folio.sqlite"), 1000).expect("kernel");
        (dir, kernel)
    }

    /// Fully bootstrapped storage with the built-in policy.
    pub(crate) async fn state() -> (TempDir, AppState) {
        let (dir, kernel) = kernel();
        crate::bootstrap::prepare_storage(&kernel, folio_kernel::default_settings())
            .await
            .expect("prepare storage");
        (dir, AppState::new(kernel, AccessGate::default()))
    }

    /// Only the settings table exists, so every activity write fails.
    pub(crate) async fn state_without_activity_log() -> (TempDir, AppState) {
        let (dir, kernel) = kernel();
        kernel
            .schema()
            .ensure_table("settings", "key TEXT PRIMARY KEY, value TEXT")
            .expect("settings table");
        kernel
            .settings()
            .seed_defaults_async(folio_kernel::default_settings())
            .await
            .expect("seed");
        (dir, AppState::new(kernel, AccessGate::default()))
    }

    pub(crate) fn request(
        method: Method,
        uri: &str,
        role: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header(ROLE_HEADER, role);
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("request")
    }

    pub(crate) async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.clone().oneshot(req).await.expect("response");
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}
