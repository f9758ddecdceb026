//! Container engine interface.
//!
//! The orchestrator never spawns `docker` directly; it goes through
//! [`ContainerEngine`] so pipeline tests can record calls instead.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::registry::credentials::Credentials;
use crate::util::process::ProcessBuilder;

/// Container path the shared build cache is mounted at.
pub const BUILD_CACHE_MOUNT: &str = "/tmp/build";

/// An image build request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuild {
    pub tags: Vec<String>,
    pub dockerfile: PathBuf,
    pub context_dir: PathBuf,
    /// Dockerfile content piped via stdin, with no build context
    pub stdin_dockerfile: Option<Vec<u8>>,
    /// Non-empty selects `docker buildx build`
    pub platforms: Vec<String>,
    /// OCI annotation key/value pairs, also applied as labels
    pub annotations: Vec<(String, String)>,
    /// Push from within the build (buildx only)
    pub push: bool,
}

impl ImageBuild {
    pub fn uses_buildx(&self) -> bool {
        !self.platforms.is_empty()
    }

    /// Arguments after the engine binary.
    pub fn to_args(&self) -> Vec<String> {
        if self.stdin_dockerfile.is_some() {
            let mut args = vec!["build".to_string()];
            for tag in &self.tags {
                args.extend(["--tag".to_string(), tag.clone()]);
            }
            args.push("-".to_string());
            return args;
        }

        let mut args = if self.uses_buildx() {
            vec!["buildx".to_string(), "build".to_string()]
        } else {
            vec!["build".to_string()]
        };

        args.extend([
            "--file".to_string(),
            self.dockerfile.display().to_string(),
        ]);

        for tag in &self.tags {
            args.push(format!("--tag={tag}"));
        }

        for platform in &self.platforms {
            args.push(format!("--platform={platform}"));
        }

        if self.uses_buildx() {
            // annotate both the image index and the manifest
            for (key, value) in &self.annotations {
                args.push(format!("--annotation=index,manifest:{key}={value}"));
            }
        }

        for (key, value) in &self.annotations {
            args.push(format!("--label={key}={value}"));
        }

        args.push(self.context_dir.display().to_string());

        if self.push && self.uses_buildx() {
            args.push("--push".to_string());
        }

        args
    }
}

/// A non-interactive `docker run` of a builder phase command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRun {
    /// `(host, container)` bind mounts
    pub volumes: Vec<(String, String)>,
    /// `(host, container)` mounts of cached directories
    pub cache_mounts: Vec<(String, String)>,
    pub workdir: Option<String>,
    /// Already-expanded `--env` arguments
    pub env_args: Vec<String>,
    pub image: String,
    pub command: Vec<String>,
}

impl ContainerRun {
    /// Arguments after the engine binary.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["run", "--rm", "--tty", "--entrypoint="]
            .into_iter()
            .map(String::from)
            .collect();

        for (host, container) in &self.volumes {
            args.extend(["--volume".to_string(), format!("{host}:{container}")]);
        }

        for (host, container) in &self.cache_mounts {
            args.push(format!("--mount=type=bind,source={host},destination={container}"));
        }

        if let Some(ref workdir) = self.workdir {
            args.extend(["--workdir".to_string(), workdir.clone()]);
        }

        args.extend(self.env_args.iter().cloned());
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Operations the orchestrator needs from a container engine.
pub trait ContainerEngine {
    fn build_image(&self, build: &ImageBuild) -> Result<()>;

    fn image_exists(&self, image: &str) -> Result<bool>;

    fn pull(&self, image: &str) -> Result<()>;

    /// Contents of the file at `path` inside `image`.
    fn read_image_file(&self, image: &str, path: &str) -> Result<Vec<u8>>;

    /// Run to completion, handing each stdout line to `on_line`.
    fn run(&self, run: &ContainerRun, on_line: &mut dyn FnMut(&str)) -> Result<()>;

    fn login(&self, registry: &str, credentials: &Credentials) -> Result<()>;

    fn tag(&self, source: &str, target: &str) -> Result<()>;

    fn push(&self, tag: &str) -> Result<()>;

    fn is_container_running(&self, name: &str) -> bool;

    /// Run with the terminal attached (`args` follow the engine binary).
    fn interactive(&self, args: &[String]) -> Result<()>;
}

/// [`ContainerEngine`] backed by the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        DockerCli {
            program: program.into(),
        }
    }

    fn cmd(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        DockerCli::new("docker")
    }
}

impl ContainerEngine for DockerCli {
    fn build_image(&self, build: &ImageBuild) -> Result<()> {
        let mut cmd = self.cmd().args(build.to_args());
        if let Some(ref dockerfile) = build.stdin_dockerfile {
            cmd = cmd.stdin(dockerfile.clone());
        }

        tracing::debug!("{}", cmd.display_command());
        cmd.status_and_check()
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self.cmd().args(["image", "inspect", image]).exec()?;
        Ok(output.status.success())
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.cmd().args(["pull", image]).status_and_check()
    }

    fn read_image_file(&self, image: &str, path: &str) -> Result<Vec<u8>> {
        // there's no read-a-file-from-an-image command short of running it
        let output = self
            .cmd()
            .args(["run", "--rm", "--entrypoint=", image, "cat", path])
            .exec_and_check()?;
        Ok(output.stdout)
    }

    fn run(&self, run: &ContainerRun, on_line: &mut dyn FnMut(&str)) -> Result<()> {
        let cmd = self.cmd().args(run.to_args());
        tracing::debug!("{}", cmd.display_command());
        cmd.exec_with_lines(on_line)
    }

    fn login(&self, registry: &str, credentials: &Credentials) -> Result<()> {
        let status = self
            .cmd()
            .args(["login", "--username", &credentials.username])
            .args(["--password", &credentials.password, registry])
            .status()?;

        // don't use the generic failure message, it would echo the password
        if !status.success() {
            bail!(
                "`{} login` to {} failed with exit code {:?}",
                self.program,
                registry,
                status.code()
            );
        }
        Ok(())
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.cmd().args(["tag", source, target]).status_and_check()
    }

    fn push(&self, tag: &str) -> Result<()> {
        self.cmd().args(["push", tag]).status_and_check()
    }

    fn is_container_running(&self, name: &str) -> bool {
        self.cmd()
            .args(["inspect", "-f", "{{.State.Running}}", name])
            .exec()
            .map(|output| {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
            })
            .unwrap_or(false)
    }

    fn interactive(&self, args: &[String]) -> Result<()> {
        let cmd = self.cmd().args(args);
        tracing::debug!("{}", cmd.display_command());
        cmd.status_and_check()
    }
}
