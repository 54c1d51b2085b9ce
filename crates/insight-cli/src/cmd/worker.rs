use crate::output::print_json;
use insight_core::config::Config;
use insight_worker::{run_action, run_loop, run_once, Executors};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, once: bool, action: Option<String>, json: bool) -> anyhow::Result<()> {
    let cfg = Config::resolve(root)?;
    let db = Arc::new(super::open_db(root)?);
    let executors = Executors::from_config(&cfg)?;

    super::block_on(async move {
        if let Some(id) = action {
            let done = run_action(&db, &executors, &id).await?;
            if json {
                return print_json(&done);
            }
            match &done.error_message {
                Some(msg) => println!("{} {}: {msg}", done.status, done.id),
                None => println!("{} {}", done.status, done.id),
            }
            return Ok(());
        }

        if once {
            let summary = run_once(&db, &executors).await?;
            if json {
                return print_json(&summary);
            }
            println!(
                "executed {}, failed {}",
                summary.executed, summary.failed
            );
            return Ok(());
        }

        println!(
            "worker polling every {}s (Ctrl-C to stop)",
            cfg.worker.poll_interval_secs
        );
        run_loop(db, executors, cfg.worker.clone(), async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
        Ok(())
    })
}
