use insight_core::{paths, InsightDb};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub db: Arc<InsightDb>,
}

impl AppState {
    /// Open the project database under `root`.
    pub fn open(root: &Path) -> insight_core::Result<Self> {
        let db = InsightDb::open(&paths::db_path(root))?;
        Ok(Self::with_db(root, Arc::new(db)))
    }

    /// Share an already-open database, e.g. with the embedded worker.
    pub fn with_db(root: &Path, db: Arc<InsightDb>) -> Self {
        Self {
            root: root.to_path_buf(),
            db,
        }
    }
}
