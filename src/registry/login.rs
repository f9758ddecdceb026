//! Registry login with a per-run cache.

use std::collections::HashSet;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::builder::engine::ContainerEngine;
use crate::core::docker_tag::DockerTag;
use crate::core::manifest::ImageSpec;
use crate::registry::credentials::{obtainer_for, Credentials};
use crate::util::env::HostEnv;
use crate::util::hash::sha256_str;

/// An image reference couldn't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse image reference: {0}")]
pub struct TagParseFailure(pub String);

/// Remembers which registry/credential pairs we've already logged in with,
/// so several images on one registry trigger one `docker login`.
///
/// Only digests are stored, never the raw passwords.
#[derive(Debug, Default)]
pub struct LoginCache {
    done: HashSet<String>,
}

impl LoginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for logging in to `registry` with `credentials`.
    pub fn key(registry: &str, credentials: &Credentials) -> String {
        sha256_str(&format!(
            "{}:{}:{}",
            registry, credentials.username, credentials.password
        ))
    }

    pub fn cached(&self, key: &str) -> bool {
        self.done.contains(key)
    }

    pub fn store(&mut self, key: String) {
        self.done.insert(key);
    }
}

/// Log in to the registry hosting `image`, unless already done this run.
///
/// Images with no credentials configured are skipped.
pub fn login_to_registry(
    image: &ImageSpec,
    engine: &dyn ContainerEngine,
    cache: &mut LoginCache,
    host_env: &HostEnv,
    ecr_region: &str,
) -> Result<()> {
    let credentials = obtainer_for(image.auth_type(), host_env, ecr_region)
        .obtain()
        .with_context(|| format!("failed to obtain credentials for {}", image.image))?;

    let Some(credentials) = credentials else {
        tracing::debug!("no registry credentials for {}; skipping login", image.image);
        return Ok(());
    };

    let parsed =
        DockerTag::parse(&image.image).ok_or_else(|| TagParseFailure(image.image.clone()))?;
    let registry = parsed.registry_or_default();

    let key = LoginCache::key(registry, &credentials);
    if cache.cached(&key) {
        return Ok(());
    }

    tracing::info!("Logging in as {} to {}", credentials.username, registry);
    engine.login(registry, &credentials)?;

    cache.store(key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::AuthType;
    use crate::registry::credentials::DOCKER_CREDS_ENV;
    use crate::test_support::{image, RecordingEngine};

    fn creds_env(value: &str) -> HostEnv {
        HostEnv::from_pairs([(DOCKER_CREDS_ENV, value)])
    }

    #[test]
    fn test_login_once_per_registry_and_credentials() {
        let engine = RecordingEngine::new();
        let mut cache = LoginCache::new();
        let env = creds_env("joonas:hunter2");

        for name in ["fn61/app", "fn61/other", "docker.io/fn61/third"] {
            login_to_registry(&image(name), &engine, &mut cache, &env, "us-east-1").unwrap();
        }
        assert_eq!(engine.calls(), vec!["login docker.io joonas"]);

        login_to_registry(&image("ghcr.io/fn61/app"), &engine, &mut cache, &env, "us-east-1")
            .unwrap();
        assert_eq!(
            engine.calls(),
            vec!["login docker.io joonas", "login ghcr.io joonas"]
        );
    }

    #[test]
    fn test_changed_credentials_log_in_again() {
        let engine = RecordingEngine::new();
        let mut cache = LoginCache::new();

        login_to_registry(&image("fn61/app"), &engine, &mut cache, &creds_env("a:1"), "x").unwrap();
        login_to_registry(&image("fn61/app"), &engine, &mut cache, &creds_env("a:2"), "x").unwrap();

        assert_eq!(engine.calls().len(), 2);
    }

    #[test]
    fn test_empty_docker_creds_fails() {
        let engine = RecordingEngine::new();
        let mut cache = LoginCache::new();

        for env in [HostEnv::default(), creds_env("")] {
            let err = login_to_registry(&image("fn61/app"), &engine, &mut cache, &env, "x")
                .unwrap_err();
            assert!(format!("{:#}", err).contains("DOCKER_CREDS not set"));
        }
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_unparseable_image() {
        let engine = RecordingEngine::new();
        let mut cache = LoginCache::new();

        let err = login_to_registry(&image(""), &engine, &mut cache, &creds_env("a:b"), "x")
            .unwrap_err();
        assert!(err.downcast_ref::<TagParseFailure>().is_some());
    }

    #[test]
    fn test_ecr_without_aws_keys_fails() {
        let engine = RecordingEngine::new();
        let mut cache = LoginCache::new();
        let mut spec = image("123456.dkr.ecr.us-east-1.amazonaws.com/app");
        spec.auth_type = Some(AuthType::AwsEcr);

        let err = login_to_registry(&spec, &engine, &mut cache, &HostEnv::default(), "us-east-1")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("AWS_ACCESS_KEY_ID not set"));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_cache_stores_digests() {
        let creds = Credentials {
            username: "joonas".to_string(),
            password: "hunter2".to_string(),
        };
        let key = LoginCache::key("docker.io", &creds);
        assert!(!key.contains("hunter2"));
        assert_eq!(key.len(), 64);
    }
}
