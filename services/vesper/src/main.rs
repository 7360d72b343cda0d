use anyhow::Context;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use vesper::app::{self, AppState, build_router};
use vesper::config::VesperConfig;
use vesper::{observability, refresh};

// In-flight requests get this long to drain after SIGINT/SIGTERM.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_observability();

    let mut args = std::env::args().skip(1);
    let (Some(config_path), None) = (args.next(), args.next()) else {
        eprintln!("usage: vesper <config-file>");
        return ExitCode::FAILURE;
    };

    let config = match VesperConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "cannot read configuration");
            return ExitCode::FAILURE;
        }
    };

    // TLS is terminated by the fronting listener; fail fast if the
    // configured material is absent so the deployment error surfaces here.
    for file in [&config.ssl_cert_file, &config.ssl_key_file] {
        if !file.is_empty() && !Path::new(file).exists() {
            tracing::error!(file = %file, "configured TLS file does not exist");
            return ExitCode::FAILURE;
        }
    }

    tracing::info!(host = %config.host, "starting vesper");
    let state = match app::bootstrap(config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot start vesper service");
            return ExitCode::from(err.exit_code());
        }
    };

    match serve(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "http service failure");
            ExitCode::FAILURE
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = refresh::spawn_refresh_tasks(&state, shutdown_rx.clone());

    let addr = state.config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "vesper listening");

    let mut serve_shutdown = shutdown_rx;
    let router = build_router(state);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = serve_shutdown.changed().await;
    });
    let mut server_task = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server_task => {
            result.context("http server task")??;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutting down vesper");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task).await {
                Ok(result) => {
                    result.context("http server task")??;
                    tracing::info!("vesper gracefully stopped");
                }
                Err(_) => {
                    server_task.abort();
                    tracing::warn!("shutdown grace window expired; dropping in-flight requests");
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}

// SIGINT or SIGTERM. SIGPIPE is already ignored by the runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
