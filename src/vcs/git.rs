//! Git backend, implemented with libgit2.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::Repository;

use super::VersionControl;
use crate::core::revision::VcsKind;

/// A Git checkout.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Git { dir: dir.into() }
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.dir)
            .with_context(|| format!("failed to open git repository at {}", self.dir.display()))
    }
}

impl VersionControl for Git {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn identify(&self) -> Result<(String, DateTime<Utc>)> {
        let repo = self.open()?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("failed to resolve HEAD commit")?;

        let seconds = commit.time().seconds();
        let committed_at = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| anyhow!("commit {} has invalid timestamp {}", commit.id(), seconds))?;

        Ok((commit.id().to_string(), committed_at))
    }

    fn with_another_dir(&self, dir: &Path) -> Box<dyn VersionControl> {
        Box::new(Git::new(dir))
    }

    fn clone_from(&self, source: &str) -> Result<()> {
        tracing::debug!("git clone {} -> {}", source, self.dir.display());

        // a dry-run checkout leaves the working tree empty until `update`
        let mut checkout = CheckoutBuilder::new();
        checkout.dry_run();

        RepoBuilder::new()
            .with_checkout(checkout)
            .clone(source, &self.dir)
            .with_context(|| format!("failed to clone {}", source))?;

        Ok(())
    }

    fn pull(&self) -> Result<()> {
        let repo = self.open()?;
        let mut remote = repo
            .find_remote("origin")
            .context("repository has no `origin` remote")?;

        remote
            .fetch(&["+refs/heads/*:refs/remotes/origin/*"], None, None)
            .context("failed to fetch from origin")?;

        Ok(())
    }

    fn update(&self, revision: &str) -> Result<()> {
        let repo = self.open()?;
        let commit = repo
            .revparse_single(revision)
            .and_then(|obj| obj.peel_to_commit())
            .with_context(|| format!("revision {} not found", revision))?;

        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
            .with_context(|| format!("failed to check out {}", revision))?;
        repo.set_head_detached(commit.id())?;

        Ok(())
    }
}
