//! Environment argument expansion for builder containers.

use thiserror::Error;

use crate::core::manifest::BuilderSpec;
use crate::core::os_arch::OsArches;
use crate::core::revision::RevisionId;
use crate::util::env::HostEnv;

/// A relayed variable is required but not set on the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ENV var missing: {0}")]
pub struct EnvVarMissing(pub String);

/// Append `--env` arguments for a builder container to `base_args`.
///
/// Order is fixed: revision variables, relayed host variables (name only,
/// so the value never appears on our command line), the builder's literal
/// `env` in key order, `BUILD_*` markers, then `FASTBUILD`/`DEBUG`.
#[allow(clippy::too_many_arguments)]
pub fn expand_env_args(
    base_args: Vec<String>,
    revision: &RevisionId,
    builder: &BuilderSpec,
    envs_required: bool,
    os_arches: &OsArches,
    fast_build: bool,
    debug: bool,
    host_env: &HostEnv,
) -> Result<Vec<String>, EnvVarMissing> {
    let mut args = base_args;

    push_env(&mut args, "FRIENDLY_REV_ID", &revision.friendly_revision_id);
    push_env(&mut args, "REV_ID", &revision.revision_id);
    push_env(&mut args, "REV_ID_SHORT", &revision.revision_id_short);

    for name in &builder.pass_envs {
        if host_env.is_set(name) {
            args.extend(["--env".to_string(), name.clone()]);
        } else if envs_required {
            return Err(EnvVarMissing(name.clone()));
        }
    }

    for (key, value) in &builder.envs {
        push_env(&mut args, key, value);
    }

    for marker in os_arches.build_env_vars() {
        push_env(&mut args, marker, "true");
    }

    if fast_build {
        push_env(&mut args, "FASTBUILD", "1");
    }

    if debug {
        push_env(&mut args, "DEBUG", "1");
    }

    Ok(args)
}

fn push_env(args: &mut Vec<String>, key: &str, value: &str) {
    args.push("--env".to_string());
    args.push(format!("{key}={value}"));
}
