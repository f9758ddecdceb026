//! Revision identifiers derived from version control.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the short revision id.
pub const SHORT_ID_LEN: usize = 8;

/// Suffix marking revisions built from an uncommitted working tree.
pub const UNCOMMITTED_SUFFIX: &str = "-uncommitted";

/// Version control system used by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VcsKind {
    #[serde(rename = "git")]
    Git,
    #[serde(rename = "hg")]
    Mercurial,
}

impl VcsKind {
    /// The serialized name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "hg",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VcsKind {
    type Err = UnknownVcsKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(VcsKind::Git),
            "hg" => Ok(VcsKind::Mercurial),
            _ => Err(UnknownVcsKind(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown VCS kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal VCS kind: {0}")]
pub struct UnknownVcsKind(pub String);

/// Where a revision id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionSource {
    Vcs(VcsKind),
    /// The revision was handed to us by CI rather than read from a checkout.
    ManagedByCi,
}

impl fmt::Display for RevisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSource::Vcs(kind) => kind.fmt(f),
            RevisionSource::ManagedByCi => f.write_str("managedByCi"),
        }
    }
}

/// Identity of the revision being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionId {
    pub source: RevisionSource,
    /// Full revision id (commit hash)
    pub revision_id: String,
    /// First [`SHORT_ID_LEN`] characters of the revision id
    pub revision_id_short: String,
    /// `YYYYMMDD_HHMM_<short>`, used as the default image tag
    pub friendly_revision_id: String,
}

impl RevisionId {
    /// Derive a revision id from a full commit id and its timestamp.
    ///
    /// When `only_committed` is false the ids get an `-uncommitted` suffix and
    /// the friendly id uses `now` instead of the commit time, so repeated
    /// builds of a dirty tree never reuse a tag.
    pub fn derive(
        source: RevisionSource,
        full_id: &str,
        committed_at: DateTime<Utc>,
        only_committed: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let short: String = full_id.chars().take(SHORT_ID_LEN).collect();

        if only_committed {
            RevisionId {
                source,
                revision_id: full_id.to_string(),
                friendly_revision_id: friendly_id(committed_at, &short),
                revision_id_short: short,
            }
        } else {
            let short = format!("{short}{UNCOMMITTED_SUFFIX}");
            RevisionId {
                source,
                revision_id: format!("{full_id}{UNCOMMITTED_SUFFIX}"),
                friendly_revision_id: friendly_id(now, &short),
                revision_id_short: short,
            }
        }
    }
}

fn friendly_id(at: DateTime<Utc>, short: &str) -> String {
    format!("{}_{}", at.format("%Y%m%d_%H%M"), short)
}
