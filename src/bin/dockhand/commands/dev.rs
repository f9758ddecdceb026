//! `dockhand dev` command

use anyhow::Result;

use crate::cli::DevArgs;
use dockhand::ops::dev;
use dockhand::util::GlobalContext;
use dockhand::DockerCli;

pub fn execute(args: DevArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let engine = DockerCli::new(ctx.config().docker());

    dev(&ctx, &engine, &args.builder)
}
