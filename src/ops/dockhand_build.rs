//! Implementation of `dockhand build`.
//!
//! The pipeline, in order:
//!
//! 1. clone the committed revision into a clean workspace (local builds only)
//! 2. materialize subrepos
//! 3. build Dockerfile-based builder images
//! 4. prepare, build and publish passes, each across all builders
//! 5. build (and push) the project's container images
//!
//! The first failure aborts the run. Nothing is rolled back.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use crate::builder::base_image::{cache_path_host_side, BaseImageConfig};
use crate::builder::context::{builder_image_name, BuildContext};
use crate::builder::engine::{ContainerEngine, ContainerRun, ImageBuild, BUILD_CACHE_MOUNT};
use crate::builder::env::expand_env_args;
use crate::builder::tags::{backwards_compat_tag_specs, expand_tag_specs};
use crate::core::manifest::{BuilderCommands, BuilderSpec, BuilderUses, ImageSpec, Manifest};
use crate::core::revision::{RevisionId, RevisionSource, VcsKind};
use crate::registry::login::{login_to_registry, LoginCache};
use crate::util::shell::{prefix_group_line, Shell};
use crate::util::GlobalContext;
use crate::vcs::{self, VersionControl};

/// Set by CI systems that check out the revision themselves.
pub const CI_REVISION_ID_ENV: &str = "CI_REVISION_ID";

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Run the publish pass and push images
    pub publish_artifacts: bool,

    /// Build the last commit from a clean clone, ignoring uncommitted changes
    pub only_committed: bool,

    /// Run only this builder
    pub builder_name_filter: Option<String>,

    /// Fail if a relayed env var is unset
    pub envs_are_required: bool,

    /// Skip non-essential steps and foreign architectures
    pub fast_build: bool,

    /// Treat the run as CI even without `CI_REVISION_ID`
    pub in_ci: bool,
}

/// A builder phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Build,
    Publish,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Build => "build",
            Phase::Publish => "publish",
        }
    }

    fn command<'a>(&self, commands: &'a BuilderCommands) -> &'a [String] {
        match self {
            Phase::Prepare => &commands.prepare,
            Phase::Build => &commands.build,
            Phase::Publish => &commands.publish,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the build pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{builder}.{phase}")]
    Phase {
        builder: String,
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// One container image produced by the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuildOutput {
    /// The primary tag (first expanded tag)
    pub tag: String,
}

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub images: Vec<ImageBuildOutput>,
}

/// Resolve the project, its revision and the workspace to build in.
///
/// Also returns the origin's version control handle, which is `None` when
/// the revision comes from `CI_REVISION_ID` instead of a checkout.
pub fn construct_build_context(
    opts: &BuildOptions,
    gctx: &GlobalContext,
) -> Result<(BuildContext, Option<Box<dyn VersionControl>>)> {
    let origin_dir = gctx.find_project_root()?;
    let manifest = Manifest::find_and_load(&origin_dir)?;
    let host_env = gctx.host_env();

    let (revision, vcs) = match vcs::detect_for_directory(&origin_dir) {
        Ok(vcs) => {
            let revision = vcs::current_revision_id(vcs.as_ref(), opts.only_committed)
                .context("failed to resolve current revision")?;
            (revision, Some(vcs))
        }
        Err(err) => {
            let Some(ci_revision) = host_env.get(CI_REVISION_ID_ENV) else {
                return Err(err.into());
            };
            let now = Utc::now();
            let revision =
                RevisionId::derive(RevisionSource::ManagedByCi, ci_revision, now, true, now);
            (revision, None)
        }
    };

    let in_ci = opts.in_ci || host_env.is_set(CI_REVISION_ID_ENV);
    let cloning_step_needed = !in_ci && opts.only_committed;

    let workspace_dir = if cloning_step_needed {
        project_specific_dir(gctx, &manifest.project_name).join("workspace")
    } else {
        origin_dir.clone()
    };

    tracing::debug!(
        "revision {} ({}), workspace {}",
        revision.revision_id,
        revision.source,
        workspace_dir.display()
    );

    let ctx = BuildContext {
        manifest,
        origin_dir,
        workspace_dir,
        cache_dir: gctx.config().cache_dir(),
        revision,
        publish_artifacts: opts.publish_artifacts,
        cloning_step_needed,
        builder_name_filter: opts.builder_name_filter.clone(),
        envs_are_required: opts.envs_are_required,
        fast_build: opts.fast_build,
        is_default_branch: false,
        debug: false,
        repository_url: None,
        ecr_region: gctx.config().ecr_region().to_string(),
        host_env: host_env.clone(),
    };

    Ok((ctx, vcs))
}

fn project_specific_dir(gctx: &GlobalContext, project_name: &str) -> PathBuf {
    gctx.config().workspace_root().join(project_name)
}

/// Run the build pipeline.
pub fn build(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    vcs: Option<&dyn VersionControl>,
) -> Result<BuildOutput> {
    let mut host = Host {
        open_vcs: &vcs::for_dir,
        out: &mut std::io::stdout(),
    };
    run_pipeline(ctx, engine, vcs, &mut host).context("build failed")
}

/// What the pipeline touches besides the container engine.
struct Host<'a> {
    /// Opens subrepo checkouts
    open_vcs: &'a dyn Fn(&Path, VcsKind) -> Box<dyn VersionControl>,
    /// Receives builder container output
    out: &'a mut dyn Write,
}

fn run_pipeline(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    vcs: Option<&dyn VersionControl>,
    host: &mut Host<'_>,
) -> Result<BuildOutput> {
    let shell = Shell::new(ctx.in_github_actions());

    if ctx.cloning_step_needed {
        let vcs = vcs.ok_or_else(|| {
            BuildError::Internal("cloning a workspace requires version control".to_string())
        })?;
        clone_to_workspace(ctx, vcs, &shell)?;
    }

    materialize_subrepos(ctx, host.open_vcs, &shell)?;

    // docker's own cache decides whether anything actually needs rebuilding
    for builder in ctx.selected_builders() {
        if let BuilderUses::Dockerfile(ref dockerfile) = builder.uses {
            build_builder_image(
                &ctx.manifest.project_name,
                builder,
                dockerfile,
                &ctx.workspace_dir,
                engine,
                &shell,
            )?;
        }
    }

    run_pass(ctx, engine, &shell, host, Phase::Prepare)?;
    run_pass(ctx, engine, &shell, host, Phase::Build)?;

    if ctx.publish_artifacts {
        run_pass(ctx, engine, &shell, host, Phase::Publish)?;
    }

    build_and_push_images(ctx, engine, &shell)
}

fn clone_to_workspace(ctx: &BuildContext, vcs: &dyn VersionControl, shell: &Shell) -> Result<()> {
    let project_root = ctx.workspace_dir.parent().ok_or_else(|| {
        BuildError::Internal(format!(
            "workspace {} has no parent",
            ctx.workspace_dir.display()
        ))
    })?;

    if !project_root.exists() {
        shell.heading(format!("Creating project root {}", project_root.display()));
        std::fs::create_dir_all(project_root).with_context(|| {
            format!("failed to create directory: {}", project_root.display())
        })?;
    }

    let workspace = vcs.with_another_dir(&ctx.workspace_dir);

    if !ctx.workspace_dir.exists() {
        shell.heading(format!(
            "{} does not exist; cloning",
            ctx.workspace_dir.display()
        ));
        workspace.clone_from(&ctx.origin_dir.to_string_lossy())?;
    }

    shell.heading("Pulling");
    workspace.pull()?;

    shell.heading(format!("Updating to {}", ctx.revision.revision_id));
    workspace.update(&ctx.revision.revision_id)?;

    Ok(())
}

/// Clone subrepos whose destination doesn't exist yet.
///
/// An existing destination is left alone even if it's at another revision.
fn materialize_subrepos(
    ctx: &BuildContext,
    open_vcs: &dyn Fn(&Path, VcsKind) -> Box<dyn VersionControl>,
    shell: &Shell,
) -> Result<()> {
    for subrepo in &ctx.manifest.subrepos {
        let destination = ctx.workspace_dir.join(&subrepo.destination);
        if destination.exists() {
            continue;
        }

        let kind = subrepo.kind.ok_or_else(|| {
            BuildError::Internal(format!("subrepo {} has no kind", subrepo.destination))
        })?;

        shell.heading(format!(
            "Cloning subrepo {} -> {}",
            subrepo.source,
            destination.display()
        ));

        let repo = open_vcs(&destination, kind);
        repo.clone_from(&subrepo.source)
            .with_context(|| format!("failed to clone subrepo {}", subrepo.source))?;
        repo.update(&subrepo.revision)
            .with_context(|| format!("failed to update subrepo to {}", subrepo.revision))?;
    }

    Ok(())
}

/// Build the image for a Dockerfile-based builder.
pub fn build_builder_image(
    project_name: &str,
    builder: &BuilderSpec,
    dockerfile: &Path,
    dir: &Path,
    engine: &dyn ContainerEngine,
    shell: &Shell,
) -> Result<()> {
    let image = builder_image_name(project_name, builder);
    shell.heading(format!("Building builder {} (as {})", builder.name, image));

    let dockerfile = dir.join(dockerfile);
    let stdin_dockerfile = if builder.contextless_build {
        let content = std::fs::read(&dockerfile)
            .with_context(|| format!("failed to read {}", dockerfile.display()))?;
        Some(content)
    } else {
        None
    };

    let request = ImageBuild {
        tags: vec![image],
        dockerfile,
        context_dir: dir.to_path_buf(),
        stdin_dockerfile,
        ..Default::default()
    };

    engine
        .build_image(&request)
        .with_context(|| format!("failed to build builder {}", builder.name))
}

fn run_pass(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    shell: &Shell,
    host: &mut Host<'_>,
    phase: Phase,
) -> Result<(), BuildError> {
    for builder in ctx.selected_builders() {
        let command = phase.command(&builder.commands);
        if command.is_empty() {
            continue;
        }

        run_builder(ctx, engine, shell, &mut *host.out, builder, phase, command).map_err(|source| {
            BuildError::Phase {
                builder: builder.name.clone(),
                phase,
                source: source.into(),
            }
        })?;
    }

    Ok(())
}

fn run_builder(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    shell: &Shell,
    out: &mut dyn Write,
    builder: &BuilderSpec,
    phase: Phase,
    command: &[String],
) -> Result<()> {
    let breadcrumb = format!("{}/{}", builder.name, phase);
    let image = ctx.builder_image_name(builder);

    // `docker run` would pull implicitly; pulling explicitly keeps the
    // download progress in its own log group
    let cache_mounts = if let BuilderUses::Image(_) = builder.uses {
        shell.group(format!("{} > pull", breadcrumb), || {
            pull_if_required(engine, &image)
        })?;
        base_image_cache_mounts(ctx, engine, &image)?
    } else {
        Vec::new()
    };

    // announces the command even if it doesn't emit log groups of its own
    shell.group(
        format!("{} > starting {}", breadcrumb, command.join(" ")),
        || Ok::<_, anyhow::Error>(()),
    )?;

    let env_args = expand_env_args(
        Vec::new(),
        &ctx.revision,
        builder,
        ctx.envs_are_required,
        &ctx.os_arches_to_build(),
        ctx.fast_build,
        ctx.debug,
        &ctx.host_env,
    )?;

    let run = ContainerRun {
        volumes: vec![
            (
                format!("{}/{}", ctx.workspace_dir.display(), builder.mount_source),
                builder.mount_destination.clone(),
            ),
            (
                ctx.cache_dir.display().to_string(),
                BUILD_CACHE_MOUNT.to_string(),
            ),
        ],
        cache_mounts,
        workdir: builder.workdir.clone(),
        env_args,
        image,
        command: command.to_vec(),
    };

    // a closed stdout shouldn't fail the builder
    engine.run(&run, &mut |line: &str| {
        let _ = writeln!(out, "{}", prefix_group_line(line, &breadcrumb));
    })
}

/// Host-side mounts for the directories the builder image asks to cache.
fn base_image_cache_mounts(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    image: &str,
) -> Result<Vec<(String, String)>> {
    let Some(conf) = BaseImageConfig::load(engine, image) else {
        return Ok(Vec::new());
    };

    conf.paths_to_cache
        .iter()
        .map(|container_path| -> Result<(String, String)> {
            let host_path = cache_path_host_side(&ctx.cache_dir, container_path);
            // bind mounts need an existing source
            std::fs::create_dir_all(&host_path)
                .with_context(|| format!("failed to create {}", host_path.display()))?;
            Ok((host_path.display().to_string(), container_path.clone()))
        })
        .collect()
}

fn pull_if_required(engine: &dyn ContainerEngine, image: &str) -> Result<()> {
    if engine.image_exists(image)? {
        return Ok(());
    }
    engine.pull(image)
}

fn build_and_push_images(
    ctx: &BuildContext,
    engine: &dyn ContainerEngine,
    shell: &Shell,
) -> Result<BuildOutput> {
    let mut output = BuildOutput::default();

    // building a single builder skips everything else
    if ctx.builder_name_filter.is_some() {
        return Ok(output);
    }

    let mut login_cache = LoginCache::new();

    for image in &ctx.manifest.images {
        if ctx.publish_artifacts {
            login_to_registry(
                image,
                engine,
                &mut login_cache,
                &ctx.host_env,
                &ctx.ecr_region,
            )?;
        }

        let built = build_and_push_image(ctx, image, engine, shell)
            .with_context(|| format!("image {}", image.image))?;
        output.images.push(built);
    }

    Ok(output)
}

fn build_and_push_image(
    ctx: &BuildContext,
    image: &ImageSpec,
    engine: &dyn ContainerEngine,
    shell: &Shell,
) -> Result<ImageBuildOutput> {
    let specs = if image.tags.is_empty() {
        backwards_compat_tag_specs(image.tag_latest)
    } else {
        image.tags.clone()
    };

    let tags = expand_tag_specs(&specs, ctx, &image.image);
    let Some(primary) = tags.first().cloned() else {
        bail!("no tag applies to this build");
    };

    // "Dockerfile" => workspace, "sub/Dockerfile" => workspace/sub
    let context_dir = match image.dockerfile_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => ctx.workspace_dir.join(dir),
        _ => ctx.workspace_dir.clone(),
    };

    // fast builds let the engine default to the host platform
    let platforms = if ctx.fast_build {
        Vec::new()
    } else {
        image.platforms.clone()
    };

    let mut request = ImageBuild {
        tags: tags.clone(),
        dockerfile: ctx.workspace_dir.join(&image.dockerfile_path),
        context_dir,
        stdin_dockerfile: None,
        platforms,
        annotations: image_annotations(ctx),
        push: ctx.publish_artifacts,
    };

    shell.heading(format!("Building {}", primary));

    if request.uses_buildx() {
        // multi-platform images can't be stored locally, so buildx pushes
        engine.build_image(&request)?;
        return Ok(ImageBuildOutput { tag: primary });
    }

    request.tags = vec![primary.clone()];
    engine.build_image(&request)?;

    for tag in &tags[1..] {
        engine.tag(&primary, tag)?;
    }

    if ctx.publish_artifacts {
        for tag in &tags {
            shell.heading(format!("Pushing {}", tag));
            engine.push(tag)?;
        }
    }

    Ok(ImageBuildOutput { tag: primary })
}

/// OCI annotations for the project's images. Empty values are omitted.
fn image_annotations(ctx: &BuildContext) -> Vec<(String, String)> {
    let meta = &ctx.manifest.meta;
    let repository_url = ctx.repository_url.as_deref().unwrap_or_default();
    let first_non_empty = |a: &str, b: &str| if a.is_empty() { b.to_string() } else { a.to_string() };

    [
        ("title", ctx.manifest.project_name.clone()),
        (
            "created",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("revision", ctx.revision.revision_id.clone()),
        ("version", ctx.revision.friendly_revision_id.clone()),
        ("description", meta.description.clone()),
        ("source", repository_url.to_string()),
        ("url", first_non_empty(&meta.website, repository_url)),
        (
            "documentation",
            first_non_empty(&meta.documentation, repository_url),
        ),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(key, value)| (format!("org.opencontainers.image.{key}"), value))
    .collect()
}
