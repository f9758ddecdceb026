//! `dockhand build` command

use anyhow::Result;

use crate::cli::{BuildArgs, BuildCommands};
use dockhand::ops::{build, construct_build_context, write_step_summary, BuildOptions, CiSettings};
use dockhand::util::GlobalContext;
use dockhand::DockerCli;

pub fn execute(args: BuildArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let engine = DockerCli::new(ctx.config().docker());

    if let Some(BuildCommands::InCiAutodetectSettings) = args.command {
        let settings = CiSettings::autodetect(ctx.host_env())?;

        let (mut build_ctx, vcs) = construct_build_context(&settings.build_options(), &ctx)?;
        settings.apply(&mut build_ctx);

        let output = build(&build_ctx, &engine, vcs.as_deref())?;
        write_step_summary(ctx.host_env(), &output);
        return Ok(());
    }

    let opts = BuildOptions {
        publish_artifacts: args.publish_artifacts,
        only_committed: !args.uncommitted,
        builder_name_filter: args.builder,
        envs_are_required: !args.norequire_envs,
        fast_build: args.fast,
        in_ci: false,
    };

    let (build_ctx, vcs) = construct_build_context(&opts, &ctx)?;
    let output = build(&build_ctx, &engine, vcs.as_deref())?;

    for image in &output.images {
        tracing::info!("Built {}", image.tag);
    }

    Ok(())
}
