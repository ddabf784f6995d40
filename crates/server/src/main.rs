// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! quorumd: workflow control-plane daemon.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use qm_server::{env, router, AppState, ServerConfig};

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    let root = env::project_root();
    let state = match AppState::new(ServerConfig {
        projects: vec![("default".to_string(), root.clone())],
        default_project: Some("default".to_string()),
        global_config: env::global_config_path(),
        // Lifecycle starts answer 503 until a runner implementation is wired
        // in by the embedding build.
        runner_factory: None,
    }) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, root = %root.display(), "failed to initialize server state");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let reapers: Vec<_> = state.projects().map(|s| Arc::clone(&s.reaper)).collect();
    for reaper in reapers {
        tokio::spawn(reaper.run_loop(env::reap_interval(), shutdown.clone()));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], env::port()));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, root = %root.display(), "quorumd listening");

    let app = router(state.clone());
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    state.shutdown();

    if let Err(e) = serve_result {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
    info!("quorumd stopped");
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = token.cancelled() => {}
    }
    token.cancel();
    info!("shutdown requested");
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match env::log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "quorumd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
