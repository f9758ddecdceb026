//! `dockhand info` command

use anyhow::Result;

use dockhand::ops::{format_info, info};
use dockhand::util::GlobalContext;

pub fn execute() -> Result<()> {
    let ctx = GlobalContext::new()?;
    print!("{}", format_info(&info(&ctx)?));
    Ok(())
}
