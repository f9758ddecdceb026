//! dockhand - containerized builds driven by a per-project manifest
//!
//! This crate provides the core library functionality for dockhand,
//! including the manifest model, revision resolution, registry logins,
//! and the build pipeline.

pub mod builder;
pub mod core;
pub mod ops;
pub mod registry;
pub mod util;
pub mod vcs;

/// Test utilities and mocks for dockhand unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording container engine and a fake
/// version control backend.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildContext, ContainerEngine, DockerCli};
pub use core::manifest::Manifest;
pub use core::revision::RevisionId;
pub use util::context::GlobalContext;
