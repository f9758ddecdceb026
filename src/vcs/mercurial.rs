//! Mercurial backend, driving the `hg` binary.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use super::VersionControl;
use crate::core::revision::VcsKind;
use crate::util::process::ProcessBuilder;

/// A Mercurial checkout.
#[derive(Debug, Clone)]
pub struct Mercurial {
    dir: PathBuf,
}

impl Mercurial {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Mercurial { dir: dir.into() }
    }

    fn hg(&self) -> ProcessBuilder {
        ProcessBuilder::new("hg").cwd(&self.dir)
    }
}

impl VersionControl for Mercurial {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn identify(&self) -> Result<(String, DateTime<Utc>)> {
        let output = self
            .hg()
            .args(["log", "--rev", ".", "--template", "{node},{date|isodate}"])
            .exec_and_check()?;

        parse_identify_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn with_another_dir(&self, dir: &Path) -> Box<dyn VersionControl> {
        Box::new(Mercurial::new(dir))
    }

    fn clone_from(&self, source: &str) -> Result<()> {
        // target dir doesn't exist yet, so no cwd
        ProcessBuilder::new("hg")
            .args(["clone", "--noupdate", source])
            .arg(&self.dir)
            .exec_and_check()?;
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.hg().arg("pull").exec_and_check()?;
        Ok(())
    }

    fn update(&self, revision: &str) -> Result<()> {
        self.hg()
            .args(["update", "--rev", revision])
            .exec_and_check()?;
        Ok(())
    }
}

/// Parse `<node>,<YYYY-MM-DD HH:MM +ZZZZ>`.
fn parse_identify_output(output: &str) -> Result<(String, DateTime<Utc>)> {
    let (node, date) = output
        .trim_end()
        .split_once(',')
        .ok_or_else(|| anyhow!("unexpected `hg log` output: {:?}", output))?;

    let committed_at = DateTime::parse_from_str(date, "%Y-%m-%d %H:%M %z")
        .with_context(|| format!("failed to parse hg date {:?}", date))?;

    Ok((node.to_string(), committed_at.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_identify_output() {
        let (node, at) = parse_identify_output(
            "5d1a6bd2d4ad1e37a4b6a8b8b1c8cf7d6a6e2f11,2024-06-16 12:24 +0300\n",
        )
        .unwrap();

        assert_eq!(node, "5d1a6bd2d4ad1e37a4b6a8b8b1c8cf7d6a6e2f11");
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 16, 9, 24, 0).unwrap());
    }

    #[test]
    fn test_parse_identify_output_garbage() {
        assert!(parse_identify_output("abort: no repository found").is_err());
        assert!(parse_identify_output("abc,yesterday").is_err());
    }
}
