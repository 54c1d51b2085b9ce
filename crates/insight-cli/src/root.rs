use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `INSIGHT_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.insight/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_marked(&cwd).unwrap_or(cwd)
}

fn find_marked(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(insight_core::paths::INSIGHT_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_insight_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".insight")).unwrap();
        let deep = dir.path().join("ops/runbooks");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_marked(&deep).unwrap(), dir.path());
    }
}
