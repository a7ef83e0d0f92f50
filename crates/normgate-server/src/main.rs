//! Normgate server binary.

use tracing::info;

use normgate_core::{store, Settings, Storage};
use normgate_server::{build_router, telemetry, AppState};
use normgate_upstream::UpstreamClient;

/// Interval between revoked-token set pruning sweeps.
const PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let _log_guard = telemetry::init(&settings.log);
    info!(environment = settings.environment.as_str(), "应用启动");

    let storage = Storage::init(&settings)?;
    info!(data_root = %storage.data_root().display(), "数据根目录");
    info!(uploads = %storage.uploads_root().display(), "上传文件目录");
    info!(exports = %storage.exports_root().display(), "导出文件目录");
    info!(temp = %storage.temp_dir().display(), "临时文件目录");

    let pool = store::connect(&settings.database_url, 10).await?;
    store::ensure_schema(&pool).await?;
    info!("database schema ready");

    let upstream = UpstreamClient::new()?;
    let bind_addr = settings.bind_addr;
    let state = AppState::new(settings, storage, pool, upstream);
    spawn_revoked_pruner(state.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "normgate server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Periodically drop revoked-token entries whose embedded expiry passed.
fn spawn_revoked_pruner(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
            let pruned = state.revoked.prune_expired(now);
            if pruned > 0 {
                info!(pruned, "revoked-token set pruned");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
