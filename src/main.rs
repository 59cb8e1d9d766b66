use std::env;
use std::sync::Arc;

use msg2response::config::ProxyConfig;
use msg2response::server::build_router;
use msg2response::util::{init_tracing, startup_probe, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = ProxyConfig::from_env(&args)?;

    tracing::info!(
        big_model = %config.models.big,
        small_model = %config.models.small,
        aliases = config.models.aliases.len(),
        "model mapping configured"
    );
    if config.api_key.is_some() {
        tracing::info!("auth mode: managed (upstream key from environment)");
    } else {
        tracing::info!("auth mode: passthrough (client bearer tokens forwarded upstream)");
    }

    let state = Arc::new(AppState::new(config));

    if state.config.skip_startup_checks {
        tracing::info!("startup checks skipped by configuration");
    } else {
        startup_probe(&state).await;
    }

    let addr = state.config.bind_addr.clone();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("msg2response listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
