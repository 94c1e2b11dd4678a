//! Stamps the build date and git revision into the startup banner.

use std::process::Command;

fn main() {
    let datetime = std::env::var("BUILD_DATETIME")
        .unwrap_or_else(|_| chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string());

    // CI pipelines export the revision; local builds ask git
    let git_hash = ["BUILD_GIT_HASH", "CI_COMMIT_SHORT_SHA", "GITHUB_SHA"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .map(|hash| hash.chars().take(8).collect::<String>())
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_DATETIME={datetime}");
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");
    println!("cargo:rerun-if-changed=build.rs");
    for key in ["BUILD_DATETIME", "BUILD_GIT_HASH", "CI_COMMIT_SHORT_SHA", "GITHUB_SHA"] {
        println!("cargo:rerun-if-env-changed={key}");
    }
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
