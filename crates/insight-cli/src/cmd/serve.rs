use anyhow::Context;
use insight_core::{config::Config, paths, InsightDb};
use insight_server::AppState;
use insight_worker::{run_loop, Executors};
use std::path::Path;
use std::sync::Arc;

/// Run the API. The executor loop runs in the same process by default because
/// the store file admits a single process at a time.
pub fn run(root: &Path, port: Option<u16>, no_worker: bool) -> anyhow::Result<()> {
    let cfg = Config::resolve(root)?;
    for w in cfg.validate() {
        tracing::warn!("config: {}", w.message);
    }

    let port = port.unwrap_or(cfg.server.port);
    let db_path = paths::db_path(root);
    let db = Arc::new(
        InsightDb::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?,
    );
    let state = AppState::with_db(root, Arc::clone(&db));
    let executors = if cfg.server.embedded_worker && !no_worker {
        Some(Executors::from_config(&cfg)?)
    } else {
        None
    };

    super::block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!(
            "insight API for '{}' → http://localhost:{actual_port}",
            cfg.project.name
        );

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let worker = executors.map(|executors| {
            tokio::spawn(run_loop(db, executors, cfg.worker.clone(), async move {
                let _ = stop_rx.await;
            }))
        });

        let result = tokio::select! {
            res = insight_server::serve_on(state, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        };

        let _ = stop_tx.send(());
        if let Some(handle) = worker {
            match handle.await {
                Ok(Err(e)) => tracing::error!(error = %e, "embedded worker stopped with error"),
                Err(e) => tracing::error!(error = %e, "embedded worker panicked"),
                Ok(Ok(())) => {}
            }
        }
        result
    })
}
