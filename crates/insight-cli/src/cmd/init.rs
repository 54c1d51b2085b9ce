use anyhow::Context;
use insight_core::{config::Config, io, paths, InsightDb};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "insight".to_string());

    println!("Initializing insight in: {}", root.display());

    let dir = paths::insight_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let db_path = paths::db_path(root);
    let existed = db_path.exists();
    InsightDb::open(&db_path).context("failed to create database")?;
    if existed {
        println!("  exists:  {}", paths::DB_FILE);
    } else {
        println!("  created: {}", paths::DB_FILE);
    }

    Ok(())
}
