//! `medivault-server`: HTTP entry point.
//!
//! Reads `MEDIVAULT_*` environment configuration, initializes logging,
//! opens (and migrates) the database, then serves until Ctrl+C.

use anyhow::{Context, Result};
use log::info;
use medivault_api::{build_router, AppState};
use medivault_core::{init_logging, init_stderr_logging, open_db, AppConfig, AuthService};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    match &config.log_dir {
        Some(dir) => init_logging(config.log_level, &dir.to_string_lossy()),
        None => init_stderr_logging(config.log_level),
    }
    .context("failed to initialize logging")?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    let purged = AuthService::from_connection(&conn, config.session_ttl_ms())
        .context("failed to prepare session store")?
        .purge_expired_sessions()
        .context("failed to purge expired sessions")?;
    info!("event=session_purge module=api status=ok purged={purged}");

    let addr = config.bind_addr;
    let app = build_router(AppState::new(conn, config));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        "event=server_start module=api status=ok addr={} version={}",
        addr,
        medivault_core::core_version()
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("event=server_stop module=api status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
