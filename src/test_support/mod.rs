//! Test utilities and mocks for dockhand unit tests.
//!
//! This module provides fakes for the two external collaborators of the
//! build pipeline, the container engine and version control, so pipeline
//! behavior can be checked without Docker or a real repository.
//!
//! # Example
//!
//! ```rust,ignore
//! use dockhand::test_support::{build_context, RecordingEngine};
//!
//! #[test]
//! fn test_example() {
//!     let engine = RecordingEngine::new();
//!     engine.fail_on("push");
//!
//!     // Run the pipeline against `engine`, then inspect `engine.calls()`.
//! }
//! ```

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::builder::engine::{ContainerEngine, ContainerRun, ImageBuild};
use crate::core::revision::VcsKind;
use crate::registry::credentials::Credentials;
use crate::vcs::VersionControl;

// Re-export fixtures for convenience
pub use fixtures::*;

/// Container engine that records calls instead of running anything.
///
/// Calls are recorded as short strings like `"pull alpine:latest"` or
/// `"run golang:1.22 make build"`.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<String>>,
    runs: Mutex<Vec<ContainerRun>>,
    existing_images: Mutex<HashSet<String>>,
    image_files: Mutex<HashMap<(String, String), Vec<u8>>>,
    running_containers: Mutex<HashSet<String>>,
    run_output: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingEngine {
    /// Create a new engine with no images and no containers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend an image is already present locally.
    pub fn add_image(&self, image: &str) {
        self.existing_images.lock().unwrap().insert(image.to_string());
    }

    /// Pretend `image` contains a file at `path`.
    pub fn add_image_file(&self, image: &str, path: &str, content: &[u8]) {
        self.image_files
            .lock()
            .unwrap()
            .insert((image.to_string(), path.to_string()), content.to_vec());
    }

    /// Pretend a container is running.
    pub fn add_running_container(&self, name: &str) {
        self.running_containers
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    /// Lines every `run` prints on stdout.
    pub fn set_run_output(&self, lines: &[&str]) {
        *self.run_output.lock().unwrap() = lines.iter().map(|s| s.to_string()).collect();
    }

    /// Fail the first call whose recorded form starts with `prefix`.
    pub fn fail_on(&self, prefix: &str) {
        *self.fail_on.lock().unwrap() = Some(prefix.to_string());
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Every `run` request, in full.
    pub fn runs(&self) -> Vec<ContainerRun> {
        self.runs.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());

        let mut fail_on = self.fail_on.lock().unwrap();
        if fail_on.as_deref().is_some_and(|prefix| call.starts_with(prefix)) {
            *fail_on = None;
            bail!("simulated failure: {}", call);
        }
        Ok(())
    }
}

impl ContainerEngine for RecordingEngine {
    fn build_image(&self, build: &ImageBuild) -> Result<()> {
        let verb = if build.uses_buildx() { "buildx" } else { "build" };
        let mut call = format!("{} {}", verb, build.tags.join(","));
        if build.stdin_dockerfile.is_some() {
            call.push_str(" (stdin)");
        }
        if build.push && build.uses_buildx() {
            call.push_str(" --push");
        }
        self.record(call)
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.existing_images.lock().unwrap().contains(image))
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.record(format!("pull {}", image))?;
        self.add_image(image);
        Ok(())
    }

    // reads are not recorded, they have no side effects
    fn read_image_file(&self, image: &str, path: &str) -> Result<Vec<u8>> {
        match self
            .image_files
            .lock()
            .unwrap()
            .get(&(image.to_string(), path.to_string()))
        {
            Some(content) => Ok(content.clone()),
            None => bail!("cat: {}: No such file or directory", path),
        }
    }

    fn run(&self, run: &ContainerRun, on_line: &mut dyn FnMut(&str)) -> Result<()> {
        let mut call = format!("run {}", run.image);
        for arg in &run.command {
            call.push(' ');
            call.push_str(arg);
        }
        self.runs.lock().unwrap().push(run.clone());
        self.record(call)?;

        for line in self.run_output.lock().unwrap().iter() {
            on_line(line);
        }
        Ok(())
    }

    fn login(&self, registry: &str, credentials: &Credentials) -> Result<()> {
        self.record(format!("login {} {}", registry, credentials.username))
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.record(format!("tag {} {}", source, target))
    }

    fn push(&self, tag: &str) -> Result<()> {
        self.record(format!("push {}", tag))
    }

    fn is_container_running(&self, name: &str) -> bool {
        self.running_containers.lock().unwrap().contains(name)
    }

    fn interactive(&self, args: &[String]) -> Result<()> {
        self.record(format!("interactive {}", args.join(" ")))
    }
}

/// Version control fake sharing one call log across all its clones.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    dir: PathBuf,
    revision: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeVcs {
    /// Create a fake checkout of `dir` at `revision`.
    pub fn new(dir: impl Into<PathBuf>, revision: &str) -> Self {
        FakeVcs {
            dir: dir.into(),
            revision: revision.to_string(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls recorded by this fake and every handle derived from it.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl VersionControl for FakeVcs {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn identify(&self) -> Result<(String, DateTime<Utc>)> {
        let at = DateTime::from_timestamp(1718529891, 0).unwrap_or_default();
        Ok((self.revision.clone(), at))
    }

    fn with_another_dir(&self, dir: &Path) -> Box<dyn VersionControl> {
        Box::new(FakeVcs {
            dir: dir.to_path_buf(),
            revision: self.revision.clone(),
            log: Arc::clone(&self.log),
        })
    }

    fn clone_from(&self, source: &str) -> Result<()> {
        self.record(format!("clone {} -> {}", source, self.dir.display()));
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.record(format!("pull {}", self.dir.display()));
        Ok(())
    }

    fn update(&self, revision: &str) -> Result<()> {
        self.record(format!("update {} {}", self.dir.display(), revision));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_engine_failure_injection() {
        let engine = RecordingEngine::new();
        engine.fail_on("push");

        engine.tag("a", "b").unwrap();
        assert!(engine.push("a").is_err());
        // only fails once
        engine.push("a").unwrap();

        assert_eq!(engine.calls(), vec!["tag a b", "push a", "push a"]);
    }

    #[test]
    fn test_fake_vcs_shares_log() {
        let vcs = FakeVcs::new("/origin", "abc");
        let clone = vcs.with_another_dir(Path::new("/ws"));
        clone.pull().unwrap();

        assert_eq!(vcs.calls(), vec!["pull /ws"]);
    }
}
