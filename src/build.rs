//! Build information captured by the crate's `build.rs`.
//!
//! - `GIT_HASH`: short git commit hash, or "unknown"
//! - `BUILD_TIME_UTC`: build timestamp in RFC3339 format
//! - `RUSTC_VERSION`: rustc version used to build the crate
//!
//! The client sends [`user_agent`] with every sidecar request.
//!
//! ```rust
//! let info = dapr_sdk::build::get_build_info();
//! println!("client built from commit: {}", info.git_hash);
//! ```

/// Git commit hash of the build, or "unknown" if not available.
pub const GIT_HASH: &str = env!("DAPR_SDK_GIT_HASH");

/// Build timestamp in RFC3339 format.
pub const BUILD_TIME_UTC: &str = env!("DAPR_SDK_BUILD_TIME_UTC");

/// Rustc version used for the build.
pub const RUSTC_VERSION: &str = env!("DAPR_SDK_RUSTC_VERSION");

/// Crate version from `Cargo.toml`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Git commit hash (short form)
    pub git_hash: &'static str,
    /// Build timestamp in RFC3339 format
    pub build_time_utc: &'static str,
    /// Rustc version used for the build
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn new() -> Self {
        Self {
            version: SDK_VERSION,
            git_hash: GIT_HASH,
            build_time_utc: BUILD_TIME_UTC,
            rustc_version: RUSTC_VERSION,
        }
    }

    /// `User-Agent` value identifying this client to the sidecar.
    pub fn user_agent(&self) -> String {
        format!("dapr-sdk-rust/{} ({})", self.version, self.git_hash)
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

pub fn get_build_info() -> BuildInfo {
    BuildInfo::new()
}

/// Shorthand for `get_build_info().user_agent()`.
pub fn user_agent() -> String {
    get_build_info().user_agent()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_sdk_and_version() {
        let ua = user_agent();
        assert!(ua.starts_with("dapr-sdk-rust/"));
        assert!(ua.contains(SDK_VERSION));
        assert!(ua.ends_with(&format!("({})", GIT_HASH)));
    }
}
