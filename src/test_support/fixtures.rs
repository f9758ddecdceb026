//! Test fixtures for common test scenarios.
//!
//! Pre-built manifests, builders, images, and build contexts, plus an
//! on-disk git repository with a known commit.

use std::path::{Path, PathBuf};

use crate::builder::context::BuildContext;
use crate::core::manifest::{BuilderCommands, BuilderSpec, BuilderUses, ImageSpec, Manifest};
use crate::core::revision::{RevisionId, RevisionSource, VcsKind};
use crate::util::env::HostEnv;

/// Full id of the revision used by [`build_context`].
pub const EXAMPLE_REVISION: &str = "df9e1a0b32d41977b49742d57702fbae0392c49a";

/// Wrap manifest body fields with the mandatory header fields.
pub fn manifest_json(body: &str) -> String {
    format!(
        r#"{{
    "for_description_of_this_file_see": "https://github.com/dockhand-build/dockhand",
    "version_major": 1,
    "project_name": "example",
    {body}
}}"#
    )
}

/// A valid manifest with no builders.
pub fn minimal_manifest() -> String {
    manifest_json(r#""builders": []"#)
}

/// A builder running in `alpine:latest` with a single build command.
pub fn builder(name: &str) -> BuilderSpec {
    BuilderSpec {
        name: name.to_string(),
        uses: BuilderUses::Image("alpine:latest".to_string()),
        mount_source: String::new(),
        mount_destination: "/workspace".to_string(),
        workdir: None,
        commands: BuilderCommands {
            build: vec!["bin/build.sh".to_string()],
            ..Default::default()
        },
        dev_ports: Vec::new(),
        dev_http_ingress: None,
        dev_pro_tips: Vec::new(),
        dev_shell_commands: Vec::new(),
        envs: Default::default(),
        pass_envs: Vec::new(),
        contextless_build: false,
    }
}

/// An image built from `Dockerfile` with default tags and auth.
pub fn image(name: &str) -> ImageSpec {
    ImageSpec {
        image: name.to_string(),
        dockerfile_path: PathBuf::from("Dockerfile"),
        platforms: Vec::new(),
        tag_latest: false,
        auth_type: None,
        tags: Vec::new(),
    }
}

/// Revision id matching [`EXAMPLE_REVISION`] committed 2024-06-16 09:24 UTC.
pub fn revision() -> RevisionId {
    RevisionId {
        source: RevisionSource::Vcs(VcsKind::Git),
        revision_id: EXAMPLE_REVISION.to_string(),
        revision_id_short: "df9e1a0b".to_string(),
        friendly_revision_id: "20240616_0924_df9e1a0b".to_string(),
    }
}

/// A build context for project `example` building in place, not publishing.
pub fn build_context() -> BuildContext {
    BuildContext {
        manifest: Manifest::parse(&minimal_manifest()).expect("fixture manifest is valid"),
        origin_dir: PathBuf::from("/src/example"),
        workspace_dir: PathBuf::from("/src/example"),
        cache_dir: PathBuf::from("/tmp/build"),
        revision: revision(),
        publish_artifacts: false,
        cloning_step_needed: false,
        builder_name_filter: None,
        envs_are_required: true,
        fast_build: false,
        is_default_branch: false,
        debug: false,
        repository_url: None,
        ecr_region: "us-east-1".to_string(),
        host_env: HostEnv::default(),
    }
}

/// Initialize a git repository in `dir` with one commit of `README.md`,
/// authored 2024-06-16 09:24:51 UTC. Returns the commit id.
pub fn git_repo_with_commit(dir: &Path) -> String {
    let repo = git2::Repository::init(dir).expect("init repository");
    std::fs::write(dir.join("README.md"), "# example\n").expect("write README");

    let mut index = repo.index().expect("open index");
    index
        .add_path(Path::new("README.md"))
        .expect("stage README");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");

    let sig = git2::Signature::new(
        "Example Author",
        "author@example.com",
        &git2::Time::new(1718529891, 0),
    )
    .expect("signature");

    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
        .expect("commit")
        .to_string()
}
