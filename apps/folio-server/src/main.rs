use std::net::SocketAddr;
use tracing::{error, info};

mod access_log;
mod api;
mod app_state;
mod auth;
mod bootstrap;
mod config;
mod responses;
mod router;
#[cfg(test)]
mod test_support;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    folio_otel::init();

    let file_cfg = match config::load_from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: config: {err}");
            std::process::exit(2);
        }
    };
    let http_cfg = match bootstrap::http_config(&file_cfg.http) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let bootstrap::BootstrapOutput {
        router,
        state,
        startup,
    } = match bootstrap::build(&file_cfg).await {
        Ok(output) => output,
        Err(err) => {
            error!(target: "folio::bootstrap", error = %err, "startup failed");
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    info!(
        target: "folio::bootstrap",
        tables_created = startup.schema.tables_created.len(),
        columns_added = startup.schema.columns_added.len(),
        seeded = startup.seeded,
        degraded = startup.seed_error.is_some(),
        "storage ready"
    );

    let app = bootstrap::attach_global_layers(
        bootstrap::attach_http_layers(router, http_cfg.concurrency_limit),
        state,
    );

    let listener = match tokio::net::TcpListener::bind(http_cfg.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("error: binding {}: {err}", http_cfg.addr);
            std::process::exit(2);
        }
    };
    info!(addr = %http_cfg.addr, "folio-server listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }
    info!("folio-server stopped");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
