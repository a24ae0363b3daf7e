//! Startup sequencing: open storage, converge the schema, seed default
//! settings, load the access policy, then hand back a router. The listener
//! is bound only after this succeeds.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use folio_kernel::{Kernel, SchemaReport, StoreError, CATALOG};
use folio_policy::{AccessGate, AccessPolicy};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{FileConfig, HttpSection};
use crate::{access_log, router, AppState};

pub(crate) struct BootstrapOutput {
    pub router: axum::Router<()>,
    pub state: AppState,
    pub startup: StartupReport,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StartupReport {
    pub schema: SchemaReport,
    pub seeded: usize,
    /// Set when seeding failed but the settings table was still readable.
    pub seed_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum BootstrapError {
    #[error("opening storage at {path}: {source}")]
    Storage { path: String, source: StoreError },
    #[error("schema migration failed: {0}")]
    Schema(#[source] StoreError),
    #[error("default settings could not be seeded and settings are unreadable: {0}")]
    SettingsUnreadable(#[source] StoreError),
    #[error("access policy: {0:#}")]
    Policy(anyhow::Error),
}

pub(crate) async fn build(cfg: &FileConfig) -> Result<BootstrapOutput, BootstrapError> {
    let policy = AccessPolicy::load_from_env().map_err(BootstrapError::Policy)?;

    let path = cfg.db_path();
    let kernel =
        Kernel::open_file(&path, cfg.busy_ms()).map_err(|source| BootstrapError::Storage {
            path: path.display().to_string(),
            source,
        })?;

    let startup = prepare_storage(&kernel, cfg.seed_defaults()).await?;
    let state = AppState::new(kernel, AccessGate::new(policy));
    Ok(BootstrapOutput {
        router: router::build(state.clone()),
        state,
        startup,
    })
}

/// Schema first (fatal on failure), then defaults. A seeding failure is
/// tolerated only when the settings table can still be read.
pub(crate) async fn prepare_storage(
    kernel: &Kernel,
    defaults: BTreeMap<String, String>,
) -> Result<StartupReport, BootstrapError> {
    let schema = apply_schema(kernel).await?;
    let (seeded, seed_error) = seed_settings(kernel, defaults).await?;
    Ok(StartupReport {
        schema,
        seeded,
        seed_error,
    })
}

async fn apply_schema(kernel: &Kernel) -> Result<SchemaReport, BootstrapError> {
    let schema = kernel
        .schema()
        .apply_async(CATALOG)
        .await
        .map_err(BootstrapError::Schema)?;
    if !schema.is_noop() {
        info!(
            target: "folio::bootstrap",
            tables = ?schema.tables_created,
            columns = ?schema.columns_added,
            "schema upgraded"
        );
    }
    Ok(schema)
}

/// Inserted count, plus the seeding error when startup continues degraded.
async fn seed_settings(
    kernel: &Kernel,
    defaults: BTreeMap<String, String>,
) -> Result<(usize, Option<String>), BootstrapError> {
    let settings = kernel.settings();
    match settings.seed_defaults_async(defaults).await {
        Ok(n) => Ok((n, None)),
        Err(err) => {
            warn!(target: "folio::bootstrap", error = %err, "seeding default settings failed");
            settings
                .get_all_async()
                .await
                .map_err(BootstrapError::SettingsUnreadable)?;
            warn!(target: "folio::bootstrap", "settings readable; continuing without full defaults");
            Ok((0, Some(err.to_string())))
        }
    }
}

pub(crate) fn attach_http_layers(
    router: axum::Router<()>,
    concurrency_limit: usize,
) -> axum::Router<()> {
    use tower::limit::ConcurrencyLimitLayer;
    use tower_http::trace::TraceLayer;

    router
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(concurrency_limit))
}

pub(crate) fn attach_global_layers(router: axum::Router<()>, state: AppState) -> axum::Router<()> {
    router.layer(axum::middleware::from_fn_with_state(
        state,
        access_log::access_log_mw,
    ))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum HttpConfigError {
    #[error("invalid FOLIO_HTTP_MAX_CONC: {0}")]
    InvalidConcurrency(String),
    #[error("invalid FOLIO_PORT: {0}")]
    InvalidPort(String),
    #[error("invalid FOLIO_BIND: {0}")]
    InvalidBind(String),
    #[error(
        "FOLIO_BIND={bind} is public and role claims are unverified; set FOLIO_ALLOW_PUBLIC=1 to start anyway"
    )]
    PublicBindNotAllowed { bind: String },
}

pub(crate) struct HttpConfig {
    pub addr: SocketAddr,
    pub concurrency_limit: usize,
}

pub(crate) fn http_config(file: &HttpSection) -> Result<HttpConfig, HttpConfigError> {
    let concurrency_limit = match std::env::var("FOLIO_HTTP_MAX_CONC") {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HttpConfigError::InvalidConcurrency(raw))?,
        Err(_) => file.max_concurrency.unwrap_or(1024),
    };
    if concurrency_limit == 0 {
        return Err(HttpConfigError::InvalidConcurrency("0".into()));
    }

    let bind = std::env::var("FOLIO_BIND")
        .ok()
        .or_else(|| file.bind.clone())
        .unwrap_or_else(|| "127.0.0.1".into());
    let port = match std::env::var("FOLIO_PORT") {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| HttpConfigError::InvalidPort(raw))?,
        Err(_) => file.port.unwrap_or(5000),
    };

    enforce_public_bind_guard(&bind)?;

    let host = bind.trim();
    let addr = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else if host.eq_ignore_ascii_case("localhost") {
        format!("127.0.0.1:{port}")
    } else {
        format!("{host}:{port}")
    };
    let addr = addr
        .parse()
        .map_err(|_| HttpConfigError::InvalidBind(bind.clone()))?;

    Ok(HttpConfig {
        addr,
        concurrency_limit,
    })
}

fn enforce_public_bind_guard(bind: &str) -> Result<(), HttpConfigError> {
    let allow_public = std::env::var("FOLIO_ALLOW_PUBLIC").ok().as_deref() == Some("1");
    let bind_lower = bind.trim().to_ascii_lowercase();
    let is_loopback = matches!(
        bind_lower.as_str(),
        "127.0.0.1" | "::1" | "[::1]" | "localhost"
    );
    if !is_loopback && !allow_public {
        return Err(HttpConfigError::PublicBindNotAllowed {
            bind: bind.to_string(),
        });
    }
    Ok(())
}
