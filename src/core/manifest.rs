//! Project manifest parsing and schema.
//!
//! The manifest lives at `.config/dockhand.json` (legacy: `dockhand.json`)
//! in the project root. Decoding is strict: unknown fields anywhere are an
//! error, so stale or misspelled keys never get silently ignored.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::os_arch::OsArches;
use crate::core::revision::VcsKind;

/// Canonical manifest location relative to the project root.
pub const MANIFEST_NAME: &str = ".config/dockhand.json";

/// Legacy manifest location, tried when the canonical one is missing.
pub const MANIFEST_LEGACY_NAME: &str = "dockhand.json";

/// Self-identification marker every manifest must carry verbatim.
pub const FILE_DESCRIPTION_BOILERPLATE: &str = "https://github.com/dockhand-build/dockhand";

/// The only supported `version_major`.
pub const CURRENT_VERSION_MAJOR: i64 = 1;

/// Errors loading or validating a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("{} does not exist", MANIFEST_NAME)]
    #[diagnostic(
        code(dockhand::manifest::not_found),
        help("create the manifest in the project root")
    )]
    NotFound,

    #[error("unsupported manifest version {found} (supported: {})", CURRENT_VERSION_MAJOR)]
    #[diagnostic(code(dockhand::manifest::version))]
    UnsupportedVersion { found: i64 },

    #[error("you are not supposed to change `for_description_of_this_file_see`")]
    #[diagnostic(
        code(dockhand::manifest::boilerplate),
        help("set it to https://github.com/dockhand-build/dockhand")
    )]
    IncorrectBoilerplate,

    #[error("duplicate builder name: {0}")]
    #[diagnostic(code(dockhand::manifest::duplicate_builder))]
    DuplicateBuilderName(String),

    #[error("{0}: you need to opt-in to prepare_step experiment")]
    #[diagnostic(
        code(dockhand::manifest::experiment),
        help("set `experiments_i_consent_to_breakage.prepare_step` to true")
    )]
    ExperimentNotOptedIn(String),

    #[error("subrepo `{0}`: kind not set")]
    #[diagnostic(code(dockhand::manifest::subrepo_kind))]
    SubrepoKindMissing(String),

    #[error("failed to decode manifest")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read manifest: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Requested builder isn't declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("builder not found: {0}")]
pub struct BuilderNotFound(pub String);

/// The parsed project manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(rename = "for_description_of_this_file_see")]
    pub file_description_boilerplate: String,

    pub version_major: i64,

    /// Namespaces builder images and dev containers
    pub project_name: String,

    pub builders: Vec<BuilderSpec>,

    #[serde(default, rename = "docker_images", skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subrepos: Vec<SubrepoSpec>,

    /// Absent means no explicit platform was declared
    #[serde(default)]
    pub os_arches: OsArches,

    #[serde(default, rename = "experiments_i_consent_to_breakage")]
    pub experiments: Experiments,

    #[serde(default, skip_serializing_if = "ProjectMetadata::is_empty")]
    pub meta: ProjectMetadata,
}

/// Opt-in unstable features.
///
/// When an experiment graduates or is dropped its field is removed, so
/// manifests still naming it fail to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Experiments {
    pub prepare_step: bool,
}

/// Descriptive project metadata, used for image annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectMetadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub documentation: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_emoji_icon: String,
}

impl ProjectMetadata {
    fn is_empty(&self) -> bool {
        *self == ProjectMetadata::default()
    }
}

/// A containerized toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderSpec {
    pub name: String,

    /// `docker://alpine:latest` or `dockerfile://build-default.Dockerfile`
    pub uses: BuilderUses,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mount_source: String,

    pub mount_destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    pub commands: BuilderCommands,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_ports: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_http_ingress: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_pro_tips: Vec<String>,

    /// Seeded into the dev shell's history
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_shell_commands: Vec<DevShellCommand>,

    #[serde(default, rename = "env", skip_serializing_if = "BTreeMap::is_empty")]
    pub envs: BTreeMap<String, String>,

    /// Names relayed from the invoking host's environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pass_envs: Vec<String>,

    /// Pipe the Dockerfile via stdin instead of uploading a build context
    #[serde(default, skip_serializing_if = "is_false")]
    pub contextless_build: bool,
}

impl BuilderSpec {
    /// Dev command, defaulting to an interactive bash.
    pub fn dev_command_or_default(&self) -> Vec<String> {
        if self.commands.dev.is_empty() {
            vec!["bash".to_string()]
        } else {
            self.commands.dev.clone()
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Phase commands of a builder.
///
/// With builders A and B the execution order is A.prepare, B.prepare,
/// A.build, B.build, A.publish, B.publish. A builder may consume another
/// builder's prepare output during its build, and nothing is published
/// until every builder has built successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderCommands {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prepare: Vec<String>,
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publish: Vec<String>,
    #[serde(default)]
    pub dev: Vec<String>,
}

/// A command offered in the dev shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevShellCommand {
    pub command: String,
    /// Important commands are also shown as pro-tips on `dockhand dev`
    #[serde(default)]
    pub important: bool,
}

/// What a builder runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuilderUses {
    /// A pre-built image reference (`docker://...`)
    Image(String),
    /// A Dockerfile to build locally (`dockerfile://...`)
    Dockerfile(PathBuf),
}

const USES_IMAGE_PREFIX: &str = "docker://";
const USES_DOCKERFILE_PREFIX: &str = "dockerfile://";

/// Error returned for a `uses` string with an unknown scheme.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported uses format: {0}")]
pub struct UnsupportedUses(pub String);

impl std::str::FromStr for BuilderUses {
    type Err = UnsupportedUses;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(image) = s.strip_prefix(USES_IMAGE_PREFIX) {
            Ok(BuilderUses::Image(image.to_string()))
        } else if let Some(path) = s.strip_prefix(USES_DOCKERFILE_PREFIX) {
            Ok(BuilderUses::Dockerfile(PathBuf::from(path)))
        } else {
            Err(UnsupportedUses(s.to_string()))
        }
    }
}

impl TryFrom<String> for BuilderUses {
    type Error = UnsupportedUses;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BuilderUses> for String {
    fn from(uses: BuilderUses) -> String {
        uses.to_string()
    }
}

impl fmt::Display for BuilderUses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderUses::Image(image) => write!(f, "{USES_IMAGE_PREFIX}{image}"),
            BuilderUses::Dockerfile(path) => {
                write!(f, "{USES_DOCKERFILE_PREFIX}{}", path.display())
            }
        }
    }
}

/// A container image to build and optionally publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSpec {
    /// Registry/namespace/repository, without a tag
    pub image: String,

    pub dockerfile_path: PathBuf,

    /// Non-empty selects a multi-platform (buildx) build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,

    #[serde(default)]
    pub tag_latest: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,

    /// Explicit tag specs; empty uses the default `{rev_friendly}` + `latest` set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagSpec>,
}

impl ImageSpec {
    /// Auth strategy with the default applied.
    pub fn auth_type(&self) -> AuthType {
        self.auth_type.unwrap_or_default()
    }
}

/// How registry credentials are obtained for an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// `username:password` from `DOCKER_CREDS`
    #[default]
    CredsFromEnv,
    /// Exchange AWS credentials for an ECR token
    AwsEcr,
}

/// One image tag to produce at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSpec {
    /// May contain `{rev_short}` and `{rev_friendly}`
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_if: Option<TagCondition>,
}

/// Predicate deciding whether a [`TagSpec`] applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default_branch: Option<bool>,
}

/// An auxiliary repository materialized into the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubrepoSpec {
    pub source: String,

    // An empty string decodes to `None`; a missing kind is reported by
    // `Manifest::parse` since serde's required-field check can't see it.
    #[serde(
        default,
        deserialize_with = "deserialize_subrepo_kind",
        serialize_with = "serialize_subrepo_kind"
    )]
    pub kind: Option<VcsKind>,

    pub destination: String,

    pub revision: String,
}

fn deserialize_subrepo_kind<'de, D>(deserializer: D) -> Result<Option<VcsKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(serde::de::Error::custom)
}

fn serialize_subrepo_kind<S>(kind: &Option<VcsKind>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(kind.map_or("", |k| k.as_str()))
}

impl Manifest {
    /// Find and load the manifest in a project directory.
    ///
    /// Falls back to the legacy location when the canonical one is missing.
    pub fn find_and_load(project_dir: &Path) -> Result<Self, ManifestError> {
        match Self::load(&project_dir.join(MANIFEST_NAME)) {
            Err(ManifestError::NotFound) => Self::load(&project_dir.join(MANIFEST_LEGACY_NAME)),
            other => other,
        }
    }

    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound
            } else {
                ManifestError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        Self::parse(&content)
    }

    /// Parse and validate manifest content.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;

        if manifest.version_major != CURRENT_VERSION_MAJOR {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.version_major,
            });
        }

        if manifest.file_description_boilerplate != FILE_DESCRIPTION_BOILERPLATE {
            return Err(ManifestError::IncorrectBoilerplate);
        }

        validate_builders(&manifest)?;

        if let Some(subrepo) = manifest.subrepos.iter().find(|s| s.kind.is_none()) {
            return Err(ManifestError::SubrepoKindMissing(subrepo.destination.clone()));
        }

        Ok(manifest)
    }

    /// Serialize back to pretty JSON.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Get a builder by name.
    pub fn find_builder(&self, name: &str) -> Result<&BuilderSpec, BuilderNotFound> {
        self.builders
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| BuilderNotFound(name.to_string()))
    }
}

/// Check builder names are unique and experimental phases are opted into.
pub fn validate_builders(manifest: &Manifest) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();

    for builder in &manifest.builders {
        if !seen.insert(builder.name.as_str()) {
            return Err(ManifestError::DuplicateBuilderName(builder.name.clone()));
        }

        if !builder.commands.prepare.is_empty() && !manifest.experiments.prepare_step {
            return Err(ManifestError::ExperimentNotOptedIn(builder.name.clone()));
        }
    }

    Ok(())
}
