//! Helpers shared by the commands.

use std::path::{Path, PathBuf};

use kiln_config::{discover, ProjectConfig};

use crate::error::{CliError, Result, ResultExt};

/// Resolve `path` against `cwd` unless it is already absolute.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// The project root: `--cwd` when given (relative to the process directory),
/// otherwise the process directory.
pub fn resolve_project_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir().context("Cannot read the working directory")?;
    let root = match explicit {
        Some(path) => resolve_path(path, &current),
        None => current,
    };

    let metadata = std::fs::metadata(&root).with_path(&root)?;
    if !metadata.is_dir() {
        return Err(CliError::FileNotFound(root));
    }
    Ok(root)
}

/// Load `kiln.toml` / `package.json` settings for `root`.
pub fn load_project(root: &Path) -> Result<ProjectConfig> {
    let project = discover(root)?;
    tracing::debug!(root = %root.display(), "settings loaded");
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_path_absolute() {
        let abs = if cfg!(windows) { "C:\\site" } else { "/site" };
        assert_eq!(resolve_path(Path::new(abs), Path::new("/work")), PathBuf::from(abs));
    }

    #[test]
    fn test_resolve_path_relative() {
        assert_eq!(
            resolve_path(Path::new("app"), Path::new("/work")),
            PathBuf::from("/work/app")
        );
    }

    #[test]
    fn test_explicit_root_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            resolve_project_root(Some(&missing)),
            Err(CliError::FileNotFound(_))
        ));
        assert_eq!(resolve_project_root(Some(dir.path())).unwrap(), dir.path());
    }

    #[test]
    fn test_explicit_root_must_be_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("kiln.toml");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            resolve_project_root(Some(&file)),
            Err(CliError::FileNotFound(path)) if path == file
        ));
    }

    #[test]
    fn test_project_without_settings_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let project = load_project(dir.path()).unwrap();
        assert_eq!(project, ProjectConfig::default());
    }
}
