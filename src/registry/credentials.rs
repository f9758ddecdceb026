//! Registry credential resolution.

use std::fmt;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use thiserror::Error;

use crate::core::manifest::AuthType;
use crate::registry::ecr::EcrCredentials;
use crate::util::env::HostEnv;

/// Variable holding `username:password` for [`AuthType::CredsFromEnv`].
pub const DOCKER_CREDS_ENV: &str = "DOCKER_CREDS";

static CREDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):(.+)$").expect("credentials regex is valid"));

/// Username and password for a registry login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// keep passwords out of debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Errors obtaining registry credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0} not set")]
    NotSet(&'static str),

    #[error("invalid format for {}; expected `username:password`", DOCKER_CREDS_ENV)]
    InvalidFormat,

    #[error("invalid format of authorization token")]
    InvalidTokenFormat,

    #[error("registry token exchange failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A strategy for obtaining registry credentials.
pub trait CredentialObtainer {
    /// `Ok(None)` means "no credentials configured", which skips login.
    fn obtain(&self) -> Result<Option<Credentials>, CredentialError>;
}

/// Reads [`DOCKER_CREDS_ENV`].
pub struct EnvCredentials<'a> {
    host_env: &'a HostEnv,
}

impl<'a> EnvCredentials<'a> {
    pub fn new(host_env: &'a HostEnv) -> Self {
        EnvCredentials { host_env }
    }
}

impl CredentialObtainer for EnvCredentials<'_> {
    fn obtain(&self) -> Result<Option<Credentials>, CredentialError> {
        let Some(serialized) = self.host_env.get(DOCKER_CREDS_ENV) else {
            return Err(CredentialError::NotSet(DOCKER_CREDS_ENV));
        };

        let caps = CREDS_RE
            .captures(serialized)
            .ok_or(CredentialError::InvalidFormat)?;

        Ok(Some(Credentials {
            username: caps[1].to_string(),
            password: caps[2].to_string(),
        }))
    }
}

/// Pick the obtainer for an image's auth type.
pub fn obtainer_for<'a>(
    auth_type: AuthType,
    host_env: &'a HostEnv,
    ecr_region: &str,
) -> Box<dyn CredentialObtainer + 'a> {
    match auth_type {
        AuthType::CredsFromEnv => Box::new(EnvCredentials::new(host_env)),
        AuthType::AwsEcr => Box::new(EcrCredentials::new(host_env, ecr_region)),
    }
}

/// Decode an HTTP Basic payload (`base64(user:password)`).
///
/// Returns `None` unless the payload is valid base64 of UTF-8 text that
/// contains a `:`.
pub fn decode_basic_auth(raw: &str) -> Option<Credentials> {
    let decoded = STANDARD.decode(raw.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
