//! # jiffy-config: configuration loading for a storage-server process
//!
//! Hierarchical configuration loading from multiple sources, highest
//! precedence first:
//!
//! 1. CLI arguments (merged in by `jiffy`'s binary before the server
//!    reads this config — this crate itself stops at environment)
//! 2. Environment variables (`JIFFY_*` prefix)
//! 3. `jiffy.local.toml` (gitignored, local overrides)
//! 4. `jiffy.toml` (git-tracked, project config)
//! 5. `~/.config/jiffy/config.toml` (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Root configuration for a Jiffy storage-server process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JiffyConfig {
    pub project: ProjectConfig,
    pub server: ServerConfig,
    pub partition: PartitionConfig,
    pub directory: DirectoryConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "jiffy-cluster".to_string(),
        }
    }
}

/// Listener ports and the block-slot pool a single storage-server
/// process hosts (spec.md §2 "fixed pool of block slots", §6 "Block
/// naming").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
    pub service_port: u16,
    pub mgmt_port: u16,
    pub notif_port: u16,
    pub chain_port: u16,
    pub block_slots: u32,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            service_port: 9090,
            mgmt_port: 9091,
            notif_port: 9092,
            chain_port: 9093,
            block_slots: 32,
            data_dir: PathBuf::from(".jiffy/data"),
        }
    }
}

/// Default load thresholds a newly `setup_block`'d hash-table partition
/// is given absent explicit `partition_metadata` (spec.md §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub capacity_bytes: u64,
    pub threshold_lo: f64,
    pub threshold_hi: f64,
    pub auto_scale: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024 * 1024,
            threshold_lo: 0.05,
            threshold_hi: 0.9,
            auto_scale: true,
        }
    }
}

/// How to reach the external directory/metadata service (spec.md §6
/// "Directory service (consumed)"); the directory itself is out of
/// scope (spec.md §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub endpoint: String,
    pub lease_renewal_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:7070".to_string(),
            lease_renewal_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub seed_nodes: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seed_nodes: Vec::new(),
        }
    }
}

impl JiffyConfig {
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves `data_dir` to an absolute path rooted at `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        if self.server.data_dir.is_relative() {
            self.server.data_dir = base.join(&self.server.data_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = JiffyConfig::default();
        assert_eq!(config.server.service_port, 9090);
        assert_eq!(config.server.block_slots, 32);
        assert!(config.partition.auto_scale);
        assert!((config.partition.threshold_hi - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn resolve_paths_anchors_relative_data_dir() {
        let mut config = JiffyConfig::default();
        config.resolve_paths("/srv/jiffy");
        assert_eq!(config.server.data_dir, PathBuf::from("/srv/jiffy/.jiffy/data"));
    }
}
