//! CI autodetection and GitHub Actions step summaries.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::builder::context::{in_github_actions, BuildContext};
use crate::ops::dockhand_build::{BuildOptions, BuildOutput};
use crate::util::env::HostEnv;

/// Branch treated as the default when `DEFAULT_BRANCH_NAME` is unset.
pub const DEFAULT_BRANCH: &str = "main";

/// Errors detecting CI settings.
#[derive(Debug, Error)]
pub enum CiError {
    #[error("unable to autodetect CI settings: not running in GitHub Actions")]
    UnsupportedCi,

    #[error("unsupported GITHUB_EVENT_NAME: {0}")]
    UnsupportedEvent(String),
}

/// Build settings derived from the CI environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiSettings {
    pub publish_artifacts: bool,
    pub repository_url: Option<String>,
    pub is_default_branch: bool,
    pub debug: bool,
}

impl CiSettings {
    /// Detect settings from a GitHub Actions environment.
    pub fn autodetect(host_env: &HostEnv) -> Result<Self, CiError> {
        if !in_github_actions(host_env) {
            return Err(CiError::UnsupportedCi);
        }

        // pull requests come from forks too, which must never get to publish
        let publish_artifacts = match host_env.get("GITHUB_EVENT_NAME").unwrap_or_default() {
            "push" => true,
            "pull_request" => false,
            other => return Err(CiError::UnsupportedEvent(other.to_string())),
        };

        let repository_url = match (
            host_env.get("GITHUB_SERVER_URL"),
            host_env.get("GITHUB_REPOSITORY"),
        ) {
            (Some(server), Some(repository)) => Some(format!("{server}/{repository}")),
            _ => None,
        };

        let default_branch = host_env.get("DEFAULT_BRANCH_NAME").unwrap_or(DEFAULT_BRANCH);
        let is_default_branch = host_env.get("GITHUB_REF_NAME") == Some(default_branch);

        Ok(CiSettings {
            publish_artifacts,
            repository_url,
            is_default_branch,
            debug: host_env.get("RUNNER_DEBUG") == Some("1"),
        })
    }

    /// Options for a CI build: the committed revision, in place.
    ///
    /// Relayed variables aren't required, since runners withhold secrets
    /// from pull requests.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            publish_artifacts: self.publish_artifacts,
            only_committed: true,
            builder_name_filter: None,
            envs_are_required: false,
            fast_build: false,
            in_ci: true,
        }
    }

    /// Copy the settings that aren't known before the context is built.
    pub fn apply(&self, ctx: &mut BuildContext) {
        ctx.repository_url = self.repository_url.clone();
        ctx.is_default_branch = self.is_default_branch;
        ctx.debug = self.debug;
    }
}

/// Markdown describing the built images.
pub fn format_step_summary(output: &BuildOutput) -> String {
    let mut lines = Vec::new();
    for image in &output.images {
        let repository = image
            .tag
            .rsplit_once(':')
            .map_or(image.tag.as_str(), |(repository, _)| repository);
        let name = repository.rsplit('/').next().unwrap_or(repository);

        lines.extend([
            format!("## Image: {name}"),
            String::new(),
            "```".to_string(),
            image.tag.clone(),
            "```".to_string(),
            String::new(),
            String::new(),
        ]);
    }
    lines.join("\n")
}

/// Append the image summary to `$GITHUB_STEP_SUMMARY`, if set and any
/// images were built.
///
/// The build already succeeded at this point, so failing to write is only
/// a warning.
pub fn write_step_summary(host_env: &HostEnv, output: &BuildOutput) {
    let Some(path) = host_env.get("GITHUB_STEP_SUMMARY") else {
        return;
    };

    if output.images.is_empty() {
        return;
    }

    if let Err(e) = append_to(Path::new(path), &format_step_summary(output)) {
        tracing::warn!("failed to write step summary to {}: {}", path, e);
    }
}

fn append_to(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::dockhand_build::ImageBuildOutput;
    use crate::test_support::fixtures::build_context;
    use tempfile::TempDir;

    fn github_env(extra: &[(&str, &str)]) -> HostEnv {
        let mut env = HostEnv::from_pairs([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_SERVER_URL", "https://github.com"),
            ("GITHUB_REPOSITORY", "fn61/app"),
            ("GITHUB_REF_NAME", "main"),
        ]);
        for (key, value) in extra {
            env.set(*key, *value);
        }
        env
    }

    #[test]
    fn test_autodetect_push_to_main() {
        let settings = CiSettings::autodetect(&github_env(&[])).unwrap();
        assert_eq!(
            settings,
            CiSettings {
                publish_artifacts: true,
                repository_url: Some("https://github.com/fn61/app".to_string()),
                is_default_branch: true,
                debug: false,
            }
        );

        let mut ctx = build_context();
        settings.apply(&mut ctx);
        assert!(ctx.is_default_branch);
        assert_eq!(ctx.repository_url.as_deref(), Some("https://github.com/fn61/app"));
    }

    #[test]
    fn test_autodetect_pull_request() {
        let env = github_env(&[
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REF_NAME", "42/merge"),
            ("RUNNER_DEBUG", "1"),
        ]);
        let settings = CiSettings::autodetect(&env).unwrap();
        assert!(!settings.publish_artifacts);
        assert!(!settings.is_default_branch);
        assert!(settings.debug);
    }

    #[test]
    fn test_build_options_relay_envs_optionally() {
        let env = github_env(&[("GITHUB_EVENT_NAME", "pull_request")]);
        let opts = CiSettings::autodetect(&env).unwrap().build_options();

        assert!(!opts.publish_artifacts);
        assert!(!opts.envs_are_required);
        assert!(opts.only_committed);
        assert!(opts.in_ci);
        assert!(opts.builder_name_filter.is_none());
    }

    #[test]
    fn test_autodetect_custom_default_branch() {
        let env = github_env(&[("DEFAULT_BRANCH_NAME", "trunk")]);
        assert!(!CiSettings::autodetect(&env).unwrap().is_default_branch);

        let env = github_env(&[("DEFAULT_BRANCH_NAME", "trunk"), ("GITHUB_REF_NAME", "trunk")]);
        assert!(CiSettings::autodetect(&env).unwrap().is_default_branch);
    }

    #[test]
    fn test_autodetect_errors() {
        assert!(matches!(
            CiSettings::autodetect(&HostEnv::default()),
            Err(CiError::UnsupportedCi)
        ));

        let env = github_env(&[("GITHUB_EVENT_NAME", "schedule")]);
        let err = CiSettings::autodetect(&env).unwrap_err();
        assert_eq!(err.to_string(), "unsupported GITHUB_EVENT_NAME: schedule");
    }

    fn output() -> BuildOutput {
        BuildOutput {
            images: vec![
                ImageBuildOutput {
                    tag: "ghcr.io/fn61/app:20240616_0924_df9e1a0b".to_string(),
                },
                ImageBuildOutput {
                    tag: "fn61/worker:latest".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_format_step_summary() {
        assert_eq!(
            format_step_summary(&output()),
            "## Image: app\n\n```\nghcr.io/fn61/app:20240616_0924_df9e1a0b\n```\n\n\n\
             ## Image: worker\n\n```\nfn61/worker:latest\n```\n\n"
        );
    }

    #[test]
    fn test_write_step_summary_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("summary.md");
        std::fs::write(&path, "# Build\n").unwrap();

        let env = HostEnv::from_pairs([("GITHUB_STEP_SUMMARY", path.to_str().unwrap())]);
        write_step_summary(&env, &output());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Build\n## Image: app"));
    }

    #[test]
    fn test_write_step_summary_skips_empty_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("summary.md");

        let env = HostEnv::from_pairs([("GITHUB_STEP_SUMMARY", path.to_str().unwrap())]);
        write_step_summary(&env, &BuildOutput::default());

        assert!(!path.exists());
    }

    #[test]
    fn test_write_step_summary_failure_is_not_fatal() {
        let env = HostEnv::from_pairs([("GITHUB_STEP_SUMMARY", "/nonexistent/dir/summary.md")]);
        write_step_summary(&env, &output());
    }
}
