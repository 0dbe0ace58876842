use std::sync::Arc;

use anyhow::Context;
use routebind::config::{AppState, Config};
use routebind::logger;
use routebind::server::{
    create_reusable_listener, start_server_loop, start_signal_handler, SignalHandler,
};
use routebind::Router;

mod endpoints;

fn main() -> anyhow::Result<()> {
    // Optional config path (without extension), defaults to ./config.toml
    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::load().context("failed to load configuration from config.toml")?,
    };

    logger::init(&cfg.logging).context("failed to initialize logging")?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::info!("Using {workers} worker threads");
    } else {
        tracing::info!("Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> anyhow::Result<()> {
    let addr = cfg.get_socket_addr().map_err(anyhow::Error::msg)?;

    let store = Arc::new(endpoints::NoteStore::default());
    let mut router = Router::new();
    let routes = router.register_all(endpoints::all(&store))?;

    let listener = create_reusable_listener(addr)
        .with_context(|| format!("failed to bind {addr}"))?;

    let signals = Arc::new(SignalHandler::new());
    start_signal_handler(Arc::clone(&signals))?;

    logger::log_server_start(&addr, &cfg, routes);

    let state = Arc::new(AppState::new(cfg, router));
    start_server_loop(listener, state, Arc::clone(&signals.shutdown)).await?;

    tracing::info!("Server stopped");
    Ok(())
}
