pub mod actions;
pub mod config;
pub mod findings;
pub mod init;
pub mod report;
pub mod serve;
pub mod worker;

use anyhow::Context;
use insight_client::ApiClient;
use insight_core::config::{ApiConfig, Config, ExecutionContext};
use insight_core::{InsightDb, InsightError};
use std::path::Path;

/// API settings for commands that talk to the server. An uninitialized root
/// still works against a remote API configured through the environment.
pub fn api_client(root: &Path) -> anyhow::Result<ApiClient> {
    let api = match Config::resolve(root) {
        Ok(cfg) => cfg.api,
        Err(InsightError::NotInitialized) => {
            let mut api = ApiConfig::default();
            api.apply_env(|key| std::env::var(key).ok());
            api
        }
        Err(e) => return Err(e).context("failed to load config"),
    };
    Ok(ApiClient::new(&api, ExecutionContext::Client)?)
}

/// Open the local store. Fails while `insight serve` holds it.
pub fn open_db(root: &Path) -> anyhow::Result<InsightDb> {
    Config::load(root)?;
    let path = insight_core::paths::db_path(root);
    InsightDb::open(&path).with_context(|| {
        format!(
            "failed to open {} (is `insight serve` running against this root?)",
            path.display()
        )
    })
}

/// Run an async command body on a fresh runtime.
pub fn block_on<F, T>(fut: F) -> anyhow::Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    tokio::runtime::Runtime::new()?.block_on(fut)
}
