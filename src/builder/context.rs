//! Build context: everything one build run needs to know.

use std::path::PathBuf;

use crate::core::manifest::{BuilderSpec, BuilderUses, Manifest};
use crate::core::os_arch::OsArches;
use crate::core::revision::RevisionId;
use crate::util::env::HostEnv;

/// Set by GitHub Actions on its runners.
pub const GITHUB_ACTIONS_ENV: &str = "GITHUB_ACTIONS";

/// Per-run build settings, constructed once before the pipeline starts.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub manifest: Manifest,

    /// Where the repository lives
    pub origin_dir: PathBuf,

    /// Where the revision is built; a clean clone or `origin_dir`
    pub workspace_dir: PathBuf,

    /// Host side of the `/tmp/build` mount
    pub cache_dir: PathBuf,

    pub revision: RevisionId,

    pub publish_artifacts: bool,

    /// False in CI or when building uncommitted changes
    pub cloning_step_needed: bool,

    /// Only run this builder (and skip image builds)
    pub builder_name_filter: Option<String>,

    pub envs_are_required: bool,

    /// Skip non-essential steps and foreign architectures
    pub fast_build: bool,

    /// Whether we're on `main` or equivalent; gates `latest` tags
    pub is_default_branch: bool,

    pub debug: bool,

    /// Human-visitable URL, like `https://github.com/dockhand-build/dockhand`
    pub repository_url: Option<String>,

    /// AWS region for ECR logins
    pub ecr_region: String,

    pub host_env: HostEnv,
}

impl BuildContext {
    /// Builders that pass the name filter, in manifest order.
    pub fn selected_builders(&self) -> impl Iterator<Item = &BuilderSpec> {
        self.manifest.builders.iter().filter(|b| {
            self.builder_name_filter
                .as_deref()
                .map_or(true, |name| b.name == name)
        })
    }

    /// Targets to build for; fast builds only build for this host.
    pub fn os_arches_to_build(&self) -> OsArches {
        if self.fast_build {
            self.manifest.os_arches.only_for_current_host()
        } else {
            self.manifest.os_arches
        }
    }

    pub fn in_github_actions(&self) -> bool {
        in_github_actions(&self.host_env)
    }

    pub fn builder_image_name(&self, builder: &BuilderSpec) -> String {
        builder_image_name(&self.manifest.project_name, builder)
    }
}

pub fn in_github_actions(host_env: &HostEnv) -> bool {
    host_env.get(GITHUB_ACTIONS_ENV) == Some("true")
}

/// Image a builder runs in: the referenced image, or the name we build its
/// Dockerfile as.
pub fn builder_image_name(project_name: &str, builder: &BuilderSpec) -> String {
    match builder.uses {
        BuilderUses::Image(ref image) => image.clone(),
        BuilderUses::Dockerfile(_) => format!("dh-{}-builder-{}", project_name, builder.name),
    }
}

/// Name of a builder's long-lived dev container.
pub fn dev_container_name(project_name: &str, builder_name: &str) -> String {
    format!("dhdev-{}-{}", project_name, builder_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::{build_context, builder};

    #[test]
    fn test_builder_image_name() {
        let mut spec = builder("frontend");
        assert_eq!(builder_image_name("example", &spec), "alpine:latest");

        spec.uses = BuilderUses::Dockerfile(PathBuf::from("build-frontend.Dockerfile"));
        assert_eq!(
            builder_image_name("example", &spec),
            "dh-example-builder-frontend"
        );
        assert_eq!(dev_container_name("example", "frontend"), "dhdev-example-frontend");
    }

    #[test]
    fn test_selected_builders() {
        let mut ctx = build_context();
        ctx.manifest.builders = vec![builder("a"), builder("b"), builder("c")];

        let names: Vec<_> = ctx.selected_builders().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        ctx.builder_name_filter = Some("b".to_string());
        let names: Vec<_> = ctx.selected_builders().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_github_actions_detection() {
        let mut ctx = build_context();
        assert!(!ctx.in_github_actions());

        ctx.host_env.set(GITHUB_ACTIONS_ENV, "true");
        assert!(ctx.in_github_actions());
    }
}
