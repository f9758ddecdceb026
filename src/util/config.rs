//! Configuration file support for dockhand.
//!
//! dockhand supports two configuration file locations:
//! - Global: `~/.dockhand/config.toml` - User-wide defaults
//! - Project: `.dockhand/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default root for clean-checkout workspaces.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp/dockhand";

/// Default host directory mounted at `/tmp/build` in builder containers.
pub const DEFAULT_CACHE_DIR: &str = "/tmp/build";

/// Default container engine binary.
pub const DEFAULT_DOCKER: &str = "docker";

/// Region used for the ECR token exchange.
pub const DEFAULT_ECR_REGION: &str = "us-east-1";

/// dockhand configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Registry settings
    pub registry: RegistryConfig,
}

/// Build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Where committed-only builds clone the project
    pub workspace_root: Option<PathBuf>,

    /// Host directory shared by all builders as `/tmp/build`
    pub cache_dir: Option<PathBuf>,

    /// Container engine binary (name or path)
    pub docker: Option<String>,
}

/// Registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// AWS region for ECR authorization tokens
    pub ecr_region: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration, returning defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.workspace_root.is_some() {
            self.build.workspace_root = other.build.workspace_root;
        }
        if other.build.cache_dir.is_some() {
            self.build.cache_dir = other.build.cache_dir;
        }
        if other.build.docker.is_some() {
            self.build.docker = other.build.docker;
        }
        if other.registry.ecr_region.is_some() {
            self.registry.ecr_region = other.registry.ecr_region;
        }
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.build
            .workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_ROOT))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.build
            .cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    pub fn docker(&self) -> &str {
        self.build.docker.as_deref().unwrap_or(DEFAULT_DOCKER)
    }

    pub fn ecr_region(&self) -> &str {
        self.registry
            .ecr_region
            .as_deref()
            .unwrap_or(DEFAULT_ECR_REGION)
    }
}

/// Load configuration with global and project-level merging.
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Global dockhand directory (`~/.dockhand`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".dockhand"))
}

/// Project-level config path.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".dockhand").join("config.toml")
}
