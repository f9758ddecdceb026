//! Implementation of `dockhand dev`.
//!
//! Opens an interactive shell in a builder's container. A second `dev`
//! for the same builder joins the running container instead of starting
//! another one.

use std::path::Path;

use anyhow::{Context, Result};

use crate::builder::context::{builder_image_name, dev_container_name, in_github_actions};
use crate::builder::engine::{ContainerEngine, BUILD_CACHE_MOUNT};
use crate::builder::env::expand_env_args;
use crate::core::manifest::{BuilderSpec, BuilderUses, Manifest};
use crate::core::revision::RevisionId;
use crate::ops::dockhand_build::build_builder_image;
use crate::util::shell::Shell;
use crate::util::GlobalContext;
use crate::vcs;

/// Builder used when none is named.
pub const DEFAULT_BUILDER: &str = "default";

/// Enter a dev shell for `builder_name`.
pub fn dev(gctx: &GlobalContext, engine: &dyn ContainerEngine, builder_name: &str) -> Result<()> {
    let root = gctx.find_project_root()?;
    let manifest = Manifest::find_and_load(&root)?;
    let builder = manifest.find_builder(builder_name)?;
    let shell = Shell::new(in_github_actions(gctx.host_env()));

    if let BuilderUses::Dockerfile(ref dockerfile) = builder.uses {
        build_builder_image(
            &manifest.project_name,
            builder,
            dockerfile,
            &root,
            engine,
            &shell,
        )?;
    }

    let container_name = dev_container_name(&manifest.project_name, &builder.name);

    let args = if engine.is_container_running(&container_name) {
        tracing::info!("joining running container {}", container_name);
        exec_args(&container_name, builder)
    } else {
        let vcs = vcs::detect_for_directory(&root)?;
        let revision = vcs::current_revision_id(vcs.as_ref(), false)
            .context("failed to resolve current revision")?;

        run_args(gctx, &manifest, builder, &root, &revision)?
    };

    print_pro_tips(builder);

    engine
        .interactive(&args)
        .with_context(|| format!("dev container {} failed", container_name))
}

fn exec_args(container_name: &str, builder: &BuilderSpec) -> Vec<String> {
    let mut args: Vec<String> = ["exec", "--interactive", "--tty", container_name]
        .into_iter()
        .map(String::from)
        .collect();
    args.extend(builder.dev_command_or_default());
    args
}

fn run_args(
    gctx: &GlobalContext,
    manifest: &Manifest,
    builder: &BuilderSpec,
    root: &Path,
    revision: &RevisionId,
) -> Result<Vec<String>> {
    let mut args: Vec<String> = ["run", "--rm", "--interactive", "--tty", "--name"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(dev_container_name(&manifest.project_name, &builder.name));

    args.extend([
        "--volume".to_string(),
        format!("{}:{}", root.display(), builder.mount_destination),
        "--volume".to_string(),
        format!("{}:{}", gctx.config().cache_dir().display(), BUILD_CACHE_MOUNT),
    ]);

    if let Some(ref workdir) = builder.workdir {
        args.extend(["--workdir".to_string(), workdir.clone()]);
    }

    for port in &builder.dev_ports {
        args.extend(["--publish".to_string(), port.clone()]);
    }

    // a missing secret shouldn't keep anyone out of their shell
    let mut args = expand_env_args(
        args,
        revision,
        builder,
        false,
        &manifest.os_arches,
        false,
        false,
        gctx.host_env(),
    )?;

    args.push(builder_image_name(&manifest.project_name, builder));
    args.extend(builder.dev_command_or_default());
    Ok(args)
}

fn print_pro_tips(builder: &BuilderSpec) {
    let important = builder
        .dev_shell_commands
        .iter()
        .filter(|c| c.important)
        .map(|c| &c.command);

    for tip in builder.dev_pro_tips.iter().chain(important) {
        tracing::info!("Pro-tip: {}", tip);
    }

    if let Some(ref ingress) = builder.dev_http_ingress {
        tracing::info!("HTTP ingress: {}", ingress);
    }
}
