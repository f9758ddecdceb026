//! Core data structures for dockhand.
//!
//! - The project manifest (builders, images, subrepos)
//! - Revision identifiers
//! - Image reference parsing
//! - OS/arch target flags

pub mod docker_tag;
pub mod manifest;
pub mod os_arch;
pub mod revision;

pub use docker_tag::DockerTag;
pub use manifest::{
    AuthType, BuilderCommands, BuilderNotFound, BuilderSpec, BuilderUses, ImageSpec, Manifest,
    ManifestError, SubrepoSpec, TagCondition, TagSpec, MANIFEST_NAME,
};
pub use os_arch::OsArches;
pub use revision::{RevisionId, RevisionSource, VcsKind};
