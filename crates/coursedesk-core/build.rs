use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Run `git` with `args` and return trimmed stdout, if it succeeded.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env=COURSEDESK_{key}={value}");
}

fn main() {
    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    // A dirty tree gets a marker so local builds are never mistaken for a commit.
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some();
    emit(
        "GIT_HASH",
        &if dirty && hash != "unknown" {
            format!("{hash}-dirty")
        } else {
            hash
        },
    );

    let built_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    emit("BUILD_TIMESTAMP", &built_at.to_string());

    emit(
        "BUILD_PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
    );

    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs");
    println!("cargo:rerun-if-changed=build.rs");
}
