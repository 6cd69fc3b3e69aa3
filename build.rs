use std::env;
use std::process::Command;

const SHA_VAR: &str = "LOGMAP_GIT_SHA";

fn main() {
    println!("cargo:rerun-if-env-changed={}", SHA_VAR);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    // version() reports "unknown" when nothing is exported
    if let Some(sha) = git_sha() {
        println!("cargo:rustc-env={}={}", SHA_VAR, sha);
    }
}

/// Commit to stamp into experiments: an explicit LOGMAP_GIT_SHA wins (tarball builds), else git.
/// An explicitly empty variable disables the stamp.
fn git_sha() -> Option<String> {
    match env::var(SHA_VAR) {
        Ok(sha) => non_empty(&sha),
        Err(_) => {
            let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
            if !output.status.success() {
                return None;
            }
            non_empty(&String::from_utf8_lossy(&output.stdout))
        }
    }
}

fn non_empty(sha: &str) -> Option<String> {
    let sha = sha.trim();
    (!sha.is_empty()).then(|| sha.to_string())
}
