//! Path utilities and XDG directory discovery.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for a Jiffy storage-server process.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("rs", "Jiffy", "jiffy"),
        }
    }

    /// `~/.config/jiffy/`
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Xdg("failed to determine user config directory".to_string()))
    }

    /// `~/.config/jiffy/config.toml`
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// `<project_dir>/jiffy.toml`
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("jiffy.toml")
    }

    /// `<project_dir>/jiffy.local.toml` (gitignored local overrides)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("jiffy.local.toml")
    }

    /// `<project_dir>/.jiffy` (runtime state: backing dumps, pid files)
    pub fn state_dir(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(".jiffy")
    }

    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn project_paths_are_rooted_at_project_dir() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        assert_eq!(
            Paths::project_config_file(project_dir),
            project_dir.join("jiffy.toml")
        );
        assert_eq!(
            Paths::local_config_file(project_dir),
            project_dir.join("jiffy.local.toml")
        );
        assert_eq!(Paths::state_dir(project_dir), project_dir.join(".jiffy"));
        assert!(!Paths::is_initialized(project_dir));

        std::fs::write(Paths::project_config_file(project_dir), "[project]\nname = \"t\"\n")
            .unwrap();
        assert!(Paths::is_initialized(project_dir));
    }

    #[test]
    fn xdg_user_config_file_lives_under_user_config_dir() {
        let paths = Paths::new();
        if let Ok(file) = paths.user_config_file() {
            assert!(file.to_string_lossy().contains("jiffy"));
        }
    }
}
