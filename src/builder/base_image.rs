//! Hints a builder image ships about itself.
//!
//! An image may carry a JSON file at [`BASE_IMAGE_CONF_PATH`]. Its
//! `paths_to_cache` lists container directories (module caches and the
//! like) that get bind-mounted from the host, so later runs reuse them.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::engine::ContainerEngine;

/// Location of the config inside a builder image.
pub const BASE_IMAGE_CONF_PATH: &str = "/dockhand-baseimage.json";

/// Base image config. Fields dockhand doesn't use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BaseImageConfig {
    #[serde(default)]
    pub paths_to_cache: Vec<String>,
}

impl BaseImageConfig {
    pub fn parse(content: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(content)
    }

    /// Read the config from `image`.
    ///
    /// The file is optional, so an image without one (or with one we can't
    /// read) yields `None`.
    pub fn load(engine: &dyn ContainerEngine, image: &str) -> Option<Self> {
        let content = match engine.read_image_file(image, BASE_IMAGE_CONF_PATH) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("no base image config in {}: {:#}", image, e);
                return None;
            }
        };

        match Self::parse(&content) {
            Ok(conf) => Some(conf),
            Err(e) => {
                tracing::warn!("ignoring invalid {} in {}: {}", BASE_IMAGE_CONF_PATH, image, e);
                None
            }
        }
    }
}

/// Host directory backing the cached container path `container_path`.
pub fn cache_path_host_side(cache_dir: &Path, container_path: &str) -> PathBuf {
    cache_dir
        .join("cache-paths")
        .join(container_path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEngine;

    #[test]
    fn test_parse_ignores_other_fields() {
        let conf = BaseImageConfig::parse(
            br#"{
                "for_description_of_this_file_see": "https://github.com/dockhand-build/dockhand",
                "dev_shell_commands": [{ "command": "go test ./..." }],
                "paths_to_cache": ["/root/.cache/go-build", "/go/pkg/mod"]
            }"#,
        )
        .unwrap();

        assert_eq!(conf.paths_to_cache, vec!["/root/.cache/go-build", "/go/pkg/mod"]);
    }

    #[test]
    fn test_load_missing_or_invalid() {
        let engine = RecordingEngine::new();
        assert_eq!(BaseImageConfig::load(&engine, "alpine:latest"), None);

        engine.add_image_file("alpine:latest", BASE_IMAGE_CONF_PATH, b"not json");
        assert_eq!(BaseImageConfig::load(&engine, "alpine:latest"), None);
    }

    #[test]
    fn test_cache_path_host_side() {
        assert_eq!(
            cache_path_host_side(Path::new("/tmp/build"), "/go/pkg/mod"),
            PathBuf::from("/tmp/build/cache-paths/go/pkg/mod")
        );
    }
}
