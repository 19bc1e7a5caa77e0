use std::process::Command;

/// Build script that captures build metadata to expose at runtime through env vars.
///
/// The values end up in `dapr_sdk::build` and in the client's `User-Agent`.
fn main() {
    // Short commit hash, "unknown" outside a git checkout
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| {
            println!("cargo:warning=git hash unavailable, using \"unknown\"");
            "unknown".to_string()
        });

    let build_time = chrono::Utc::now().to_rfc3339();

    let rustc_version = Command::new("rustc")
        .arg("--version")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|e| {
            eprintln!("Warning: Failed to get rustc version: {}", e);
            "unknown".to_string()
        });

    println!("cargo:rustc-env=DAPR_SDK_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=DAPR_SDK_BUILD_TIME_UTC={}", build_time);
    println!("cargo:rustc-env=DAPR_SDK_RUSTC_VERSION={}", rustc_version);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}
