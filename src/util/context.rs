//! Global context for dockhand operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{ManifestError, MANIFEST_LEGACY_NAME, MANIFEST_NAME};
use crate::util::config::{self, Config};
use crate::util::env::HostEnv;

/// Per-invocation context: where we are, what's configured, what the host
/// environment looks like.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Merged global + project configuration
    config: Config,

    host_env: HostEnv,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    ///
    /// Configuration is read from the global directory and from the project
    /// enclosing `cwd` (if any).
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let global_dir = config::global_config_dir().unwrap_or_else(|| PathBuf::from(".dockhand"));

        let project_root = find_project_root(&cwd).unwrap_or_else(|_| cwd.clone());
        let config = config::load_config(
            &global_dir.join("config.toml"),
            &config::project_config_path(&project_root),
        );

        GlobalContext {
            cwd,
            config,
            host_env: HostEnv::from_process(),
        }
    }

    /// Replace the host environment snapshot.
    pub fn with_host_env(mut self, host_env: HostEnv) -> Self {
        self.host_env = host_env;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host_env(&self) -> &HostEnv {
        &self.host_env
    }

    /// Find the project root (directory containing the manifest) starting
    /// from cwd and searching upward.
    pub fn find_project_root(&self) -> Result<PathBuf, ManifestError> {
        find_project_root(&self.cwd)
    }
}

fn find_project_root(start: &Path) -> Result<PathBuf, ManifestError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(MANIFEST_NAME).is_file() || current.join(MANIFEST_LEGACY_NAME).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ManifestError::NotFound);
        }
    }
}
