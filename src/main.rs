use std::time::Duration;

use anyhow::Context;
use embedded_ui_proxy::config::Config;
use embedded_ui_proxy::sampler::{spawn_sampler, SAMPLE_PERIOD};
use embedded_ui_proxy::state::AppState;
use embedded_ui_proxy::store::QueryStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = match Config::from_args(std::env::args()) {
        Ok(cfg) => cfg,
        Err(usage) => {
            println!("{usage}");
            return Ok(());
        }
    };

    let store = QueryStore::open(&cfg.db_path)
        .with_context(|| format!("cannot open database {}", cfg.db_path))?;

    let sampler = spawn_sampler(store.clone(), SAMPLE_PERIOD);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("cannot build upstream HTTP client")?;

    let state = AppState {
        store,
        client,
        ui_remote_url: cfg.ui_remote_url.clone(),
        query_timeout: cfg.query_timeout,
    };
    let app = embedded_ui_proxy::router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;

    info!("listening on {addr}");
    info!("proxying UI requests to {}", cfg.ui_remote_url);
    info!("using database {}", cfg.db_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    sampler.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
