//! High-level operations.
//!
//! This module contains the implementation of dockhand commands.

pub mod ci;
pub mod dockhand_build;
pub mod dockhand_dev;
pub mod info;

pub use ci::{write_step_summary, CiSettings};
pub use dockhand_build::{build, construct_build_context, BuildOptions, BuildOutput};
pub use dockhand_dev::{dev, DEFAULT_BUILDER};
pub use info::{format_info, info};
