//! Version control backends.
//!
//! The build pipeline needs four things from a repository: its current
//! revision, and clone/pull/update to materialize a clean workspace or a
//! subrepo at a pinned revision.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::revision::{RevisionId, RevisionSource, VcsKind};

pub mod git;
pub mod mercurial;

pub use git::Git;
pub use mercurial::Mercurial;

/// Errors from VCS detection.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("VCS mechanism not identified for {}", .dir.display())]
    NotIdentified { dir: PathBuf },
}

/// A repository checkout at a directory.
pub trait VersionControl {
    fn kind(&self) -> VcsKind;

    /// Full id and commit time of the checked-out revision.
    fn identify(&self) -> Result<(String, DateTime<Utc>)>;

    /// Same backend, operating on `dir`.
    fn with_another_dir(&self, dir: &Path) -> Box<dyn VersionControl>;

    /// Clone `source` into this handle's directory without checking out files.
    fn clone_from(&self, source: &str) -> Result<()>;

    /// Fetch new revisions from the clone's origin.
    fn pull(&self) -> Result<()>;

    /// Force the working tree to `revision`.
    fn update(&self, revision: &str) -> Result<()>;
}

/// Detect the VCS of `dir`. Mercurial wins if both markers exist.
pub fn detect_for_directory(dir: &Path) -> Result<Box<dyn VersionControl>, VcsError> {
    if dir.join(".hg").exists() {
        return Ok(for_dir(dir, VcsKind::Mercurial));
    }

    if dir.join(".git").exists() {
        return Ok(for_dir(dir, VcsKind::Git));
    }

    Err(VcsError::NotIdentified {
        dir: dir.to_path_buf(),
    })
}

/// Backend for `kind` operating on `dir`.
pub fn for_dir(dir: &Path, kind: VcsKind) -> Box<dyn VersionControl> {
    match kind {
        VcsKind::Git => Box::new(Git::new(dir)),
        VcsKind::Mercurial => Box::new(Mercurial::new(dir)),
    }
}

/// Resolve the revision id of the checkout.
pub fn current_revision_id(vcs: &dyn VersionControl, only_committed: bool) -> Result<RevisionId> {
    let (full_id, committed_at) = vcs.identify()?;

    Ok(RevisionId::derive(
        RevisionSource::Vcs(vcs.kind()),
        &full_id,
        committed_at,
        only_committed,
        Utc::now(),
    ))
}
