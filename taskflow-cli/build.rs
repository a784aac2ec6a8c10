use std::path::Path;
use std::process::Command;

/// Embeds the short git revision as `TASKFLOW_BUILD_SHA` for `taskflow --version`.
/// Packagers can pin it by exporting the variable themselves.
fn main() {
    println!("cargo:rerun-if-env-changed=TASKFLOW_BUILD_SHA");

    let sha = std::env::var("TASKFLOW_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(git_short_sha)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TASKFLOW_BUILD_SHA={sha}");
}

fn git_short_sha() -> Option<String> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").ok()?;
    let workspace = Path::new(&manifest_dir).parent()?;

    let head = workspace.join(".git").join("HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }

    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}
