//! Container build machinery.
//!
//! This module holds the per-run build context, the container engine
//! interface, and the pure helpers that turn manifest data into engine
//! arguments (environment relay, image tags).

pub mod base_image;
pub mod context;
pub mod engine;
pub mod env;
pub mod tags;

pub use context::{builder_image_name, dev_container_name, BuildContext};
pub use engine::{ContainerEngine, ContainerRun, DockerCli, ImageBuild};
pub use env::{expand_env_args, EnvVarMissing};
pub use tags::{backwards_compat_tag_specs, expand_tag_specs};
