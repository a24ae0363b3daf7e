use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target used by the server's access log middleware.
pub const ACCESS_TARGET: &str = "http.access";

static ACCESS_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install the global subscriber: console output filtered by `RUST_LOG`
/// (default `info`), plus a rolling access log file when
/// `FOLIO_ACCESS_LOG_ROLL=1`. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install_console(filter);
}

fn install_console(filter: EnvFilter) {
    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(filter));
    match access_settings() {
        Some(access) => {
            if std::fs::create_dir_all(&access.dir).is_err() {
                tracing::warn!(directory = %access.dir, "failed to create access log directory");
            }
            let writer = match access.rotation.as_str() {
                "hourly" => tracing_appender::rolling::hourly(&access.dir, &access.prefix),
                "minutely" => tracing_appender::rolling::minutely(&access.dir, &access.prefix),
                _ => tracing_appender::rolling::daily(&access.dir, &access.prefix),
            };
            let (nb, guard) = tracing_appender::non_blocking(writer);
            let _ = ACCESS_GUARD.set(guard);
            let targets = Targets::new().with_target(ACCESS_TARGET, tracing::Level::INFO);
            let access_layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(nb)
                .with_filter(targets);
            let _ = registry.with(access_layer).try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccessFileSettings {
    dir: String,
    prefix: String,
    rotation: String,
}

fn access_settings() -> Option<AccessFileSettings> {
    access_settings_from(|key| std::env::var(key).ok())
}

fn access_settings_from(get: impl Fn(&str) -> Option<String>) -> Option<AccessFileSettings> {
    if get("FOLIO_ACCESS_LOG_ROLL").as_deref() != Some("1") {
        return None;
    }
    let dir = get("FOLIO_ACCESS_LOG_DIR")
        .or_else(|| get("FOLIO_LOGS_DIR"))
        .unwrap_or_else(|| "logs".to_string());
    let prefix = get("FOLIO_ACCESS_LOG_PREFIX").unwrap_or_else(|| "http-access".into());
    let rotation = get("FOLIO_ACCESS_LOG_ROTATION")
        .unwrap_or_else(|| "daily".into())
        .to_ascii_lowercase();
    Some(AccessFileSettings {
        dir,
        prefix,
        rotation,
    })
}
