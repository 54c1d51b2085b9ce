use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INSIGHT_DIR: &str = ".insight";
pub const CONFIG_FILE: &str = ".insight/config.yaml";
pub const DB_FILE: &str = ".insight/insight.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn insight_dir(root: &Path) -> PathBuf {
    root.join(INSIGHT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
