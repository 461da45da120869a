//! Configuration loader with multi-source merging.

use crate::{JiffyConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "JIFFY".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(self) -> Result<JiffyConfig> {
        let mut builder = config::Config::builder();

        let defaults = JiffyConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let built = builder.build().context("failed to build configuration")?;

        let mut jiffy_config: JiffyConfig = built
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        jiffy_config.resolve_paths(&self.project_dir);

        Ok(jiffy_config)
    }

    pub fn load_or_default(self) -> JiffyConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_defaults_when_no_files_present() {
        let temp_dir = tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .unwrap();
        assert_eq!(config.server.service_port, 9090);
        assert_eq!(config.server.block_slots, 32);
    }

    #[test]
    fn project_config_overrides_defaults() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();
        fs::write(
            project_dir.join("jiffy.toml"),
            r#"
[project]
name = "test-cluster"

[server]
service_port = 10000
block_slots = 64
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().unwrap();
        assert_eq!(config.project.name, "test-cluster");
        assert_eq!(config.server.service_port, 10000);
        assert_eq!(config.server.block_slots, 64);
    }

    #[test]
    fn local_config_overrides_project_config() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();
        fs::write(
            project_dir.join("jiffy.toml"),
            "[server]\nservice_port = 10000\n",
        )
        .unwrap();
        fs::write(
            project_dir.join("jiffy.local.toml"),
            "[server]\nservice_port = 10001\n",
        )
        .unwrap();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().unwrap();
        assert_eq!(config.server.service_port, 10001);
    }

    #[test]
    fn data_dir_is_resolved_to_an_absolute_path() {
        let temp_dir = tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .unwrap();
        assert!(config.server.data_dir.is_absolute());
    }
}
