//! OS/architecture combinations a project produces artifacts for.

use serde::{Deserialize, Serialize};

/// Which OS/arch combos this project's build artifacts support.
///
/// Keys follow Go's `GOOS-GOARCH` naming (`linux-amd64`), with `neutral`
/// variants for artifacts where the arch (or both OS and arch) don't matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct OsArches {
    pub neutral: bool,
    pub linux_neutral: bool,
    pub linux_amd64: bool,
    pub linux_arm: bool,
    pub linux_arm64: bool,
    pub linux_riscv64: bool,
    pub windows_neutral: bool,
    pub windows_amd64: bool,
    pub darwin_amd64: bool,
}

impl OsArches {
    /// Marker variables (`BUILD_LINUX_AMD64`, ...) for every enabled target.
    ///
    /// The in-container build script reads these to learn what to produce.
    pub fn build_env_vars(&self) -> Vec<&'static str> {
        [
            (self.neutral, "BUILD_NEUTRAL"),
            (self.windows_neutral, "BUILD_WINDOWS_NEUTRAL"),
            (self.windows_amd64, "BUILD_WINDOWS_AMD64"),
            (self.linux_neutral, "BUILD_LINUX_NEUTRAL"),
            (self.linux_amd64, "BUILD_LINUX_AMD64"),
            (self.linux_arm, "BUILD_LINUX_ARM"),
            (self.linux_arm64, "BUILD_LINUX_ARM64"),
            (self.linux_riscv64, "BUILD_LINUX_RISCV64"),
            (self.darwin_amd64, "BUILD_DARWIN_AMD64"),
        ]
        .into_iter()
        .filter_map(|(enabled, key)| enabled.then_some(key))
        .collect()
    }

    /// True if no target is declared.
    pub fn is_empty(&self) -> bool {
        *self == OsArches::default()
    }

    /// Narrow to what can run on `os`/`arch` (Rust `std::env::consts` names).
    ///
    /// Neutral targets are kept, arch-specific ones only for the given host.
    pub fn only_for(&self, os: &str, arch: &str) -> OsArches {
        let linux = os == "linux";
        let windows = os == "windows";
        let darwin = os == "macos";

        OsArches {
            neutral: self.neutral,
            linux_neutral: self.linux_neutral && linux,
            linux_amd64: self.linux_amd64 && linux && arch == "x86_64",
            linux_arm: self.linux_arm && linux && arch == "arm",
            linux_arm64: self.linux_arm64 && linux && arch == "aarch64",
            linux_riscv64: self.linux_riscv64 && linux && arch == "riscv64",
            windows_neutral: self.windows_neutral && windows,
            windows_amd64: self.windows_amd64 && windows && arch == "x86_64",
            darwin_amd64: self.darwin_amd64 && darwin && arch == "x86_64",
        }
    }

    /// Narrow to the host this process is running on.
    pub fn only_for_current_host(&self) -> OsArches {
        self.only_for(std::env::consts::OS, std::env::consts::ARCH)
    }
}
