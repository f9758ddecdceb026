//! Container image reference parsing.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Registry assumed when a reference names none.
pub const DOCKER_HUB_HOSTNAME: &str = "docker.io";

// registry/namespace/repository[:tag|@digest]
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([^/]+)/)?(?:([^/]+)/)?([^@:]+)(?:[@:](.+))?$")
        .expect("image reference regex is valid")
});

/// A parsed image reference like `docker.io/joonas/redis:1.2.3.4`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerTag {
    pub registry: String,
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

impl DockerTag {
    /// Parse an image reference. Returns `None` if it can't be parsed.
    ///
    /// With a single leading path component, it is a registry only if it
    /// contains a `.` (`123456.dkr.ecr.us-east-1.amazonaws.com/app`),
    /// otherwise it is a namespace (`joonas/redis`).
    pub fn parse(serialized: &str) -> Option<DockerTag> {
        let caps = REFERENCE_RE.captures(serialized)?;
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();

        let first = group(1);
        let second = group(2);

        if second.is_empty() && !first.is_empty() && !first.contains('.') {
            return Some(DockerTag {
                registry: String::new(),
                namespace: first,
                repository: group(3),
                tag: group(4),
            });
        }

        Some(DockerTag {
            registry: first,
            namespace: second,
            repository: group(3),
            tag: group(4),
        })
    }

    /// The registry host, defaulting to Docker Hub.
    pub fn registry_or_default(&self) -> &str {
        if self.registry.is_empty() {
            DOCKER_HUB_HOSTNAME
        } else {
            &self.registry
        }
    }
}

impl fmt::Display for DockerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.registry, &self.namespace] {
            if !part.is_empty() {
                write!(f, "{part}/")?;
            }
        }
        f.write_str(&self.repository)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        Ok(())
    }
}
